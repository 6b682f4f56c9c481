//! Extender Dispatcher
//!
//! Owns the predicate and priority registries and runs the scheduler's
//! filter and prioritize callbacks against them.

use super::metrics::ExtenderMetrics;
use super::types::{ExtenderArgs, ExtenderFilterResult, FailedNodes, HostPriorityList, NodeItems};
use crate::domain::ports::{ClusterCacheRef, ResourceKind};
use crate::error::{Error, Result};
use crate::scheduling::{
    HostPathAffinity, HostPathDiskPressure, HostPathDiskUse, HostPathSpread, PluginCategory,
    PluginContext, PluginRegistry, Predicate, PredicateRef, Priority, PriorityRef,
};
use k8s_openapi::api::core::v1::{Node, Pod};
use kube::ResourceExt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Candidate nodes of one callback
struct Candidates {
    nodes: Vec<Node>,
    /// Names the request carried that the cache does not know
    missing: Vec<String>,
    by_name: bool,
}

/// Scheduler extender over the hostpath plugins
pub struct Extender {
    predicates: PluginRegistry<dyn Predicate>,
    priorities: PluginRegistry<dyn Priority>,
    cache: Option<ClusterCacheRef>,
    metrics: ExtenderMetrics,
}

impl Extender {
    /// Create an extender with empty registries
    pub fn new() -> Result<Self> {
        Ok(Self {
            predicates: PluginRegistry::new(PluginCategory::Predicates),
            priorities: PluginRegistry::new(PluginCategory::Priorities),
            cache: None,
            metrics: ExtenderMetrics::new()?,
        })
    }

    /// Create an extender with every hostpath plugin registered
    pub fn with_default_plugins() -> Result<Self> {
        let mut extender = Self::new()?;
        extender.register_predicate(Arc::new(HostPathAffinity::new()))?;
        extender.register_predicate(Arc::new(HostPathDiskPressure::new()))?;
        extender.register_priority(Arc::new(HostPathDiskUse::new()))?;
        extender.register_priority(Arc::new(HostPathSpread::new()))?;
        Ok(extender)
    }

    pub fn register_predicate(&mut self, predicate: PredicateRef) -> Result<()> {
        self.predicates.register(predicate)
    }

    pub fn register_priority(&mut self, priority: PriorityRef) -> Result<()> {
        self.priorities.register(priority)
    }

    /// Initialize both registries
    pub async fn init(&mut self, ctx: &PluginContext) -> Result<()> {
        self.predicates.init(ctx).await?;
        self.priorities.init(ctx).await?;
        self.cache = Some(ctx.cache.clone());

        info!(
            predicates = ?self.predicates.names(),
            priorities = ?self.priorities.names(),
            "Extender initialized"
        );
        Ok(())
    }

    /// Whether both registries are initialized and every plugin is ready
    pub fn ready(&self) -> bool {
        self.predicates.ready() && self.priorities.ready()
    }

    pub fn predicates(&self) -> &PluginRegistry<dyn Predicate> {
        &self.predicates
    }

    pub fn priorities(&self) -> &PluginRegistry<dyn Priority> {
        &self.priorities
    }

    pub fn metrics(&self) -> &ExtenderMetrics {
        &self.metrics
    }

    // =========================================================================
    // Filter
    // =========================================================================

    /// Run a predicate over every candidate node
    ///
    /// Nodes are evaluated one after another. A node whose evaluation fails
    /// is rejected with the error as its reason; the others are unaffected.
    pub fn filter(&self, plugin: &str, args: ExtenderArgs) -> Result<ExtenderFilterResult> {
        let predicate = self
            .predicates
            .get(plugin)
            .ok_or_else(|| Error::PluginNotFound {
                category: PluginCategory::Predicates.to_string(),
                name: plugin.to_string(),
            })?;
        let started = Instant::now();

        let pod = &args.pod;
        let pod_key = pod_key(pod);
        let candidates = self.candidates(&args)?;

        let mut admitted = Vec::with_capacity(candidates.nodes.len());
        let mut failed = FailedNodes::new();
        let mut rejected = 0;
        let mut errors = 0;

        for name in &candidates.missing {
            failed.insert(name.clone(), format!("node {} not found in cache", name));
            errors += 1;
        }

        for node in candidates.nodes {
            let name = node.name_any();
            match predicate.pod_matches_node(pod, &node) {
                Ok(true) => admitted.push(node),
                Ok(false) => {
                    rejected += 1;
                    failed.insert(name, format!("{} predicate rejected node", plugin));
                }
                Err(e) => {
                    if e.is_upstream() {
                        warn!(pod = %pod_key, node = %name, error = %e, "Predicate lookup failed");
                    } else {
                        debug!(pod = %pod_key, node = %name, error = %e, "Predicate rejected node");
                    }
                    errors += 1;
                    failed.insert(name, e.to_string());
                }
            }
        }

        debug!(
            plugin = %plugin,
            pod = %pod_key,
            admitted = admitted.len(),
            failed = failed.len(),
            "Filtered nodes"
        );
        self.metrics
            .record_filter(plugin, admitted.len(), rejected, errors);
        self.metrics
            .observe_duration(PluginCategory::Predicates, plugin, started.elapsed());

        let result = if candidates.by_name {
            ExtenderFilterResult {
                node_names: Some(admitted.iter().map(|n| n.name_any()).collect()),
                failed_nodes: Some(failed),
                ..Default::default()
            }
        } else {
            ExtenderFilterResult {
                nodes: Some(NodeItems { items: admitted }),
                failed_nodes: Some(failed),
                ..Default::default()
            }
        };
        Ok(result)
    }

    // =========================================================================
    // Prioritize
    // =========================================================================

    /// Score every candidate node with a priority
    ///
    /// Fails as a whole if any node fails to score.
    pub async fn prioritize(&self, plugin: &str, args: ExtenderArgs) -> Result<HostPriorityList> {
        let priority = self
            .priorities
            .get(plugin)
            .ok_or_else(|| Error::PluginNotFound {
                category: PluginCategory::Priorities.to_string(),
                name: plugin.to_string(),
            })?;
        let started = Instant::now();

        let candidates = self.candidates(&args)?;
        if let Some(name) = candidates.missing.first() {
            self.metrics.record_priority(plugin, false);
            return Err(Error::ResourceNotFound {
                kind: ResourceKind::Node.to_string(),
                name: name.clone(),
            });
        }

        let outcome = priority
            .score_nodes(Arc::new(args.pod), &candidates.nodes)
            .await;

        self.metrics.record_priority(plugin, outcome.is_ok());
        self.metrics
            .observe_duration(PluginCategory::Priorities, plugin, started.elapsed());
        outcome
    }

    /// Node objects of a callback, resolving names through the cache
    fn candidates(&self, args: &ExtenderArgs) -> Result<Candidates> {
        if let Some(items) = &args.nodes {
            return Ok(Candidates {
                nodes: items.items.clone(),
                missing: Vec::new(),
                by_name: false,
            });
        }

        let Some(names) = &args.node_names else {
            return Ok(Candidates {
                nodes: Vec::new(),
                missing: Vec::new(),
                by_name: false,
            });
        };

        let cache = self.cache.as_ref().ok_or(Error::NotReady)?;
        if !cache.has_synced(ResourceKind::Node) {
            return Err(Error::CacheNotSynced {
                kind: ResourceKind::Node.to_string(),
            });
        }

        let mut nodes = Vec::with_capacity(names.len());
        let mut missing = Vec::new();
        for name in names {
            match cache.get_node(name)? {
                Some(node) => nodes.push(node.as_ref().clone()),
                None => missing.push(name.clone()),
            }
        }
        Ok(Candidates {
            nodes,
            missing,
            by_name: true,
        })
    }
}

fn pod_key(pod: &Pod) -> String {
    format!("{}/{}", pod.namespace().unwrap_or_default(), pod.name_any())
}
