//! Domain Ports - Read contracts consumed by the placement logic
//!
//! These traits define the boundaries between the hostpath placement logic
//! and the cluster state it reasons about. Adapters (the kube reflector
//! cache, the static snapshot, the annotation readers) implement them.

use crate::error::Result;
use k8s_openapi::api::core::v1::{Node, PersistentVolume, PersistentVolumeClaim, Pod};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// =============================================================================
// Cached Resource Kinds
// =============================================================================

/// Resource kinds held by the cluster cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Pod,
    PersistentVolume,
    PersistentVolumeClaim,
    Node,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Pod,
        ResourceKind::PersistentVolume,
        ResourceKind::PersistentVolumeClaim,
        ResourceKind::Node,
    ];
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::Pod => write!(f, "Pod"),
            ResourceKind::PersistentVolume => write!(f, "PersistentVolume"),
            ResourceKind::PersistentVolumeClaim => write!(f, "PersistentVolumeClaim"),
            ResourceKind::Node => write!(f, "Node"),
        }
    }
}

// =============================================================================
// Hostpath Volume Classification
// =============================================================================

/// Whether multiple pods may use the same backing directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SharingMode {
    Shared,
    Exclusive,
}

/// Whether a backing directory outlives its consuming pod
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetentionMode {
    Keep,
    Ephemeral,
}

/// Classification of a hostpath volume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VolumeClass {
    pub sharing: SharingMode,
    pub retention: RetentionMode,
}

impl VolumeClass {
    pub fn new(sharing: SharingMode, retention: RetentionMode) -> Self {
        Self { sharing, retention }
    }

    pub fn is_shared(&self) -> bool {
        self.sharing == SharingMode::Shared
    }

    pub fn is_keep(&self) -> bool {
        self.retention == RetentionMode::Keep
    }
}

impl std::fmt::Display for VolumeClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sharing = match self.sharing {
            SharingMode::Shared => "shared",
            SharingMode::Exclusive => "exclusive",
        };
        let retention = match self.retention {
            RetentionMode::Keep => "keep",
            RetentionMode::Ephemeral => "ephemeral",
        };
        write!(f, "{}/{}", sharing, retention)
    }
}

// =============================================================================
// Disk Bookkeeping Types
// =============================================================================

/// A node disk partition offered to hostpath volumes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskPartition {
    /// Mount path of the partition (e.g., /xfs/disk1)
    pub mount_path: String,
    /// Bytes available to hostpath volumes
    pub allocable: u64,
    /// Partition accepts no new volume directories
    #[serde(default)]
    pub disabled: bool,
}

/// A materialized directory of a hostpath volume on a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountRecord {
    /// Directory on the node; `None` while the node agent has not reported it
    pub host_path: Option<String>,
    /// Node holding the directory
    pub node_name: String,
    /// Quota reserved for the directory
    pub quota_bytes: u64,
    /// No live pod currently consumes the directory
    pub empty: bool,
}

// =============================================================================
// Cluster Cache Port
// =============================================================================

/// Read-only view over cached cluster objects
///
/// Lookups are local indexed reads; implementations never reach the API
/// server on the evaluation path.
pub trait ClusterCache: Send + Sync {
    /// All cached pods
    fn list_pods(&self) -> Result<Vec<Arc<Pod>>>;

    /// All cached persistent volumes
    fn list_persistent_volumes(&self) -> Result<Vec<Arc<PersistentVolume>>>;

    /// Persistent volume by name
    fn get_persistent_volume(&self, name: &str) -> Result<Option<Arc<PersistentVolume>>>;

    /// Persistent volume claim by namespace and name
    fn get_persistent_volume_claim(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Arc<PersistentVolumeClaim>>>;

    /// Node by name
    fn get_node(&self, name: &str) -> Result<Option<Arc<Node>>>;

    /// Whether the initial listing of `kind` has completed
    fn has_synced(&self, kind: ResourceKind) -> bool;
}

// =============================================================================
// Node Disk Provider Port
// =============================================================================

/// Source of raw disk partitions per node
pub trait NodeDiskProvider: Send + Sync {
    /// Raw partitions of the node, before any quota is subtracted
    fn partitions(&self, node: &Node) -> Result<Vec<DiskPartition>>;
}

// =============================================================================
// Volume Metadata Port
// =============================================================================

/// Reader of hostpath classification and bookkeeping stored on volumes
pub trait VolumeMetadataReader: Send + Sync {
    /// Whether the volume is backed by a node-local directory
    fn is_hostpath(&self, pv: &PersistentVolume) -> bool;

    /// Sharing and retention classification
    fn classify(&self, pv: &PersistentVolume) -> Result<VolumeClass>;

    /// Declared capacity in bytes
    fn capacity(&self, pv: &PersistentVolume) -> Result<u64>;

    /// Recorded directories of the volume, in recorded order, with
    /// `empty` unset
    fn mount_records(&self, pv: &PersistentVolume) -> Result<Vec<MountRecord>>;
}

// =============================================================================
// Type Aliases for Arc'd Traits
// =============================================================================

pub type ClusterCacheRef = Arc<dyn ClusterCache>;
pub type NodeDiskProviderRef = Arc<dyn NodeDiskProvider>;
pub type VolumeMetadataReaderRef = Arc<dyn VolumeMetadataReader>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_class_display() {
        let class = VolumeClass::new(SharingMode::Shared, RetentionMode::Keep);
        assert_eq!(class.to_string(), "shared/keep");
        assert!(class.is_shared());
        assert!(class.is_keep());

        let class = VolumeClass::new(SharingMode::Exclusive, RetentionMode::Ephemeral);
        assert_eq!(class.to_string(), "exclusive/ephemeral");
        assert!(!class.is_shared());
        assert!(!class.is_keep());
    }

    #[test]
    fn test_disk_partition_serde() {
        let json = r#"{"mountPath": "/xfs/disk1", "allocable": 1024}"#;
        let partition: DiskPartition = serde_json::from_str(json).unwrap();
        assert_eq!(partition.mount_path, "/xfs/disk1");
        assert_eq!(partition.allocable, 1024);
        assert!(!partition.disabled);
    }
}
