//! Plugin Contract
//!
//! Every predicate and priority declares a name, a readiness probe, an
//! init hook wiring it to the cluster cache, and its evaluation entry point.

use crate::domain::ports::{ClusterCacheRef, NodeDiskProviderRef, VolumeMetadataReaderRef};
use crate::error::{Error, Result};
use crate::extender::types::HostPriorityList;
use crate::hostpath::PlacementModel;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Node, Pod};
use parking_lot::RwLock;
use std::sync::Arc;

// =============================================================================
// Plugin Category
// =============================================================================

/// Registry a plugin belongs to; also its URL segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginCategory {
    Predicates,
    Priorities,
}

impl PluginCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            PluginCategory::Predicates => "predicates",
            PluginCategory::Priorities => "priorities",
        }
    }
}

impl std::fmt::Display for PluginCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Plugin Context
// =============================================================================

/// External collaborators handed to plugins at init
#[derive(Clone)]
pub struct PluginContext {
    pub cache: ClusterCacheRef,
    pub volumes: VolumeMetadataReaderRef,
    pub disks: NodeDiskProviderRef,
}

impl PluginContext {
    pub fn new(
        cache: ClusterCacheRef,
        volumes: VolumeMetadataReaderRef,
        disks: NodeDiskProviderRef,
    ) -> Self {
        Self {
            cache,
            volumes,
            disks,
        }
    }

    /// Build a placement model over this context
    pub fn model(&self) -> PlacementModel {
        PlacementModel::new(self.cache.clone(), self.volumes.clone(), self.disks.clone())
    }
}

// =============================================================================
// Plugin Traits
// =============================================================================

/// Capabilities shared by predicates and priorities
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Stable name; also the last URL segment of the plugin's endpoint
    fn name(&self) -> &str;

    /// Whether the caches the plugin reads have synced
    fn ready(&self) -> bool;

    /// Wire the plugin to its collaborators
    async fn init(&self, ctx: &PluginContext) -> Result<()>;
}

/// Filters nodes that cannot host a pod
pub trait Predicate: Plugin {
    /// Decide whether `pod` may run on `node`
    ///
    /// An error rejects the node and is reported as its failure reason.
    fn pod_matches_node(&self, pod: &Pod, node: &Node) -> Result<bool>;
}

/// Ranks candidate nodes for a pod
#[async_trait]
pub trait Priority: Plugin {
    /// Score every node; entries follow the order of `nodes`
    async fn score_nodes(&self, pod: Arc<Pod>, nodes: &[Node]) -> Result<HostPriorityList>;
}

pub type PredicateRef = Arc<dyn Predicate>;
pub type PriorityRef = Arc<dyn Priority>;

// =============================================================================
// Model Slot
// =============================================================================

/// Placement model installed by a plugin's init
#[derive(Default)]
pub struct ModelSlot {
    model: RwLock<Option<PlacementModel>>,
}

impl ModelSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install(&self, ctx: &PluginContext) {
        *self.model.write() = Some(ctx.model());
    }

    /// Installed model, or an error naming the uninitialized plugin
    pub fn get(&self, plugin: &str) -> Result<PlacementModel> {
        self.model
            .read()
            .clone()
            .ok_or_else(|| Error::PluginNotInitialized {
                name: plugin.to_string(),
            })
    }

    pub fn ready(&self) -> bool {
        self.model
            .read()
            .as_ref()
            .map(PlacementModel::has_synced)
            .unwrap_or(false)
    }
}
