//! Plugin Registry
//!
//! Ordered registry of plugins of one category. Plugins are registered
//! before init; init wires every plugin and freezes the registry.

use super::plugin::{Plugin, PluginCategory, PluginContext};
use crate::error::{Error, Result};
use std::sync::Arc;
use tracing::{debug, info};

/// Registry of predicates or priorities
pub struct PluginRegistry<P: ?Sized> {
    category: PluginCategory,
    plugins: Vec<Arc<P>>,
    initialized: bool,
}

impl<P: Plugin + ?Sized> PluginRegistry<P> {
    /// Create an empty registry
    pub fn new(category: PluginCategory) -> Self {
        Self {
            category,
            plugins: Vec::new(),
            initialized: false,
        }
    }

    pub fn category(&self) -> PluginCategory {
        self.category
    }

    /// Add a plugin
    ///
    /// Fails on an empty name, a name already registered, or once the
    /// registry has been initialized.
    pub fn register(&mut self, plugin: Arc<P>) -> Result<()> {
        let name = plugin.name().to_string();
        if name.is_empty() {
            return Err(Error::EmptyPluginName {
                category: self.category.to_string(),
            });
        }
        if self.initialized {
            return Err(Error::RegistryInitialized {
                category: self.category.to_string(),
                name,
            });
        }
        if self.plugins.iter().any(|p| p.name() == name) {
            return Err(Error::DuplicatePlugin {
                category: self.category.to_string(),
                name,
            });
        }

        debug!(category = %self.category, plugin = %name, "Registered plugin");
        self.plugins.push(plugin);
        Ok(())
    }

    /// Initialize every plugin; the first failure aborts
    pub async fn init(&mut self, ctx: &PluginContext) -> Result<()> {
        for plugin in &self.plugins {
            plugin.init(ctx).await.map_err(|e| Error::PluginInit {
                category: self.category.to_string(),
                name: plugin.name().to_string(),
                reason: e.to_string(),
            })?;
        }
        self.initialized = true;

        info!(
            category = %self.category,
            plugins = ?self.names(),
            "Plugins initialized"
        );
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Initialized and every plugin reports ready
    pub fn ready(&self) -> bool {
        self.initialized && self.plugins.iter().all(|p| p.ready())
    }

    /// Look up a plugin by name
    pub fn get(&self, name: &str) -> Option<Arc<P>> {
        self.plugins.iter().find(|p| p.name() == name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<P>> {
        self.plugins.iter()
    }
}
