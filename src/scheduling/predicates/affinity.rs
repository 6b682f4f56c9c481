//! Hostpath Volume Affinity
//!
//! Keeps pods next to the directories their retained volumes already own.
//! The rule applied depends on the volume's sharing and retention modes:
//!
//! | sharing   | retention | rule                                              |
//! |-----------|-----------|---------------------------------------------------|
//! | shared    | keep      | stay on recorded nodes, or follow running pods    |
//! | shared    | ephemeral | any node                                          |
//! | exclusive | keep      | prefer a node holding an unused directory         |
//! | exclusive | ephemeral | any node                                          |

use crate::domain::ports::{RetentionMode, SharingMode};
use crate::error::{Error, Result};
use crate::hostpath::{pod_volumes, HostPathVolume, PlacementModel};
use crate::scheduling::plugin::{ModelSlot, Plugin, PluginContext, Predicate};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Node, Pod};
use kube::ResourceExt;
use tracing::{debug, warn};

/// Registered name
pub const AFFINITY_PREDICATE: &str = "hostpathpvaffinity";

/// Outcome of evaluating one volume against one node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AffinityVerdict {
    Match,
    Reject,
    /// No rule covered the volume; admitted
    Unknown,
}

impl AffinityVerdict {
    /// Whether the node stays a candidate
    pub fn admits(self) -> bool {
        !matches!(self, AffinityVerdict::Reject)
    }
}

/// Predicate keeping pods on nodes that hold their volume directories
#[derive(Default)]
pub struct HostPathAffinity {
    model: ModelSlot,
}

impl HostPathAffinity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate one hostpath volume of the pod against `node`
    pub fn evaluate_volume(
        model: &PlacementModel,
        volume: &HostPathVolume,
        node: &str,
    ) -> Result<AffinityVerdict> {
        let verdict = match (volume.class.sharing, volume.class.retention) {
            (SharingMode::Shared, RetentionMode::Keep) => {
                if volume.records.is_empty() {
                    let active = model.active_nodes(volume)?;
                    if active.is_empty() || active.contains(node) {
                        AffinityVerdict::Match
                    } else {
                        AffinityVerdict::Reject
                    }
                } else if volume.records.iter().any(|r| r.node_name == node) {
                    AffinityVerdict::Match
                } else {
                    AffinityVerdict::Reject
                }
            }
            (SharingMode::Exclusive, RetentionMode::Keep) => {
                if volume.records.is_empty() {
                    AffinityVerdict::Match
                } else {
                    let records = model.mount_records(volume)?;
                    if records.iter().any(|r| r.node_name == node && r.empty) {
                        AffinityVerdict::Match
                    } else if records.iter().any(|r| r.empty) {
                        // an unused directory elsewhere must be reused first
                        AffinityVerdict::Reject
                    } else {
                        AffinityVerdict::Match
                    }
                }
            }
            (_, RetentionMode::Ephemeral) => AffinityVerdict::Match,
        };

        debug!(
            volume = %volume.name(),
            class = %volume.class,
            node = %node,
            verdict = ?verdict,
            "Evaluated volume affinity"
        );
        Ok(verdict)
    }

    fn evaluate(&self, pod: &Pod, node: &str) -> Result<bool> {
        let model = self.model.get(AFFINITY_PREDICATE)?;

        // resolved lazily: a rejection stops before later lookups run
        for source in pod_volumes(pod) {
            let Some(volume) = model.resolve(pod, source)? else {
                continue;
            };
            match Self::evaluate_volume(&model, &volume, node)? {
                AffinityVerdict::Match => {}
                AffinityVerdict::Reject => return Ok(false),
                AffinityVerdict::Unknown => {
                    warn!(
                        pod = %pod.name_any(),
                        volume = %volume.name(),
                        class = %volume.class,
                        node = %node,
                        "No affinity rule applies to volume, admitting node"
                    );
                }
            }
        }
        Ok(true)
    }
}

#[async_trait]
impl Plugin for HostPathAffinity {
    fn name(&self) -> &str {
        AFFINITY_PREDICATE
    }

    fn ready(&self) -> bool {
        self.model.ready()
    }

    async fn init(&self, ctx: &PluginContext) -> Result<()> {
        self.model.install(ctx);
        Ok(())
    }
}

impl Predicate for HostPathAffinity {
    fn pod_matches_node(&self, pod: &Pod, node: &Node) -> Result<bool> {
        let node_name = node.name_any();
        self.evaluate(pod, &node_name)
            .map_err(|e| Error::predicate(AFFINITY_PREDICATE, &node_name, e))
    }
}
