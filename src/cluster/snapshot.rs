//! Static Cluster Snapshot
//!
//! A fixed set of cluster objects loaded from a YAML or JSON document.
//! Used for standalone runs without an API server.

use crate::domain::ports::{ClusterCache, ResourceKind};
use crate::error::Result;
use k8s_openapi::api::core::v1::{Node, PersistentVolume, PersistentVolumeClaim, Pod};
use kube::ResourceExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Serialized form of a snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSnapshot {
    #[serde(default)]
    pub pods: Vec<Pod>,
    #[serde(default)]
    pub persistent_volumes: Vec<PersistentVolume>,
    #[serde(default)]
    pub persistent_volume_claims: Vec<PersistentVolumeClaim>,
    #[serde(default)]
    pub nodes: Vec<Node>,
}

/// Cluster cache over a fixed snapshot; always synced
#[derive(Debug, Default)]
pub struct SnapshotCache {
    pods: Vec<Arc<Pod>>,
    persistent_volumes: BTreeMap<String, Arc<PersistentVolume>>,
    persistent_volume_claims: BTreeMap<(String, String), Arc<PersistentVolumeClaim>>,
    nodes: BTreeMap<String, Arc<Node>>,
}

impl SnapshotCache {
    /// Index a snapshot
    pub fn new(snapshot: ClusterSnapshot) -> Self {
        Self {
            pods: snapshot.pods.into_iter().map(Arc::new).collect(),
            persistent_volumes: snapshot
                .persistent_volumes
                .into_iter()
                .map(|pv| (pv.name_any(), Arc::new(pv)))
                .collect(),
            persistent_volume_claims: snapshot
                .persistent_volume_claims
                .into_iter()
                .map(|pvc| {
                    let key = (pvc.namespace().unwrap_or_default(), pvc.name_any());
                    (key, Arc::new(pvc))
                })
                .collect(),
            nodes: snapshot
                .nodes
                .into_iter()
                .map(|node| (node.name_any(), Arc::new(node)))
                .collect(),
        }
    }

    /// Load a snapshot document from disk
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let snapshot: ClusterSnapshot = serde_yaml::from_str(&raw)?;

        info!(
            path = %path.display(),
            pods = snapshot.pods.len(),
            volumes = snapshot.persistent_volumes.len(),
            claims = snapshot.persistent_volume_claims.len(),
            nodes = snapshot.nodes.len(),
            "Loaded cluster snapshot"
        );

        Ok(Self::new(snapshot))
    }
}

impl ClusterCache for SnapshotCache {
    fn list_pods(&self) -> Result<Vec<Arc<Pod>>> {
        Ok(self.pods.clone())
    }

    fn list_persistent_volumes(&self) -> Result<Vec<Arc<PersistentVolume>>> {
        Ok(self.persistent_volumes.values().cloned().collect())
    }

    fn get_persistent_volume(&self, name: &str) -> Result<Option<Arc<PersistentVolume>>> {
        Ok(self.persistent_volumes.get(name).cloned())
    }

    fn get_persistent_volume_claim(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Arc<PersistentVolumeClaim>>> {
        Ok(self
            .persistent_volume_claims
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }

    fn get_node(&self, name: &str) -> Result<Option<Arc<Node>>> {
        Ok(self.nodes.get(name).cloned())
    }

    fn has_synced(&self, _kind: ResourceKind) -> bool {
        true
    }
}
