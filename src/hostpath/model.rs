//! Hostpath Placement Model
//!
//! Resolves pod volume references to hostpath volumes and derives the
//! per-node usage bookkeeping the predicates and priorities reason about.
//! Everything is recomputed from the cache snapshot on every call.

use crate::domain::ports::{
    ClusterCacheRef, DiskPartition, MountRecord, NodeDiskProviderRef, ResourceKind, SharingMode,
    VolumeClass, VolumeMetadataReaderRef,
};
use crate::error::{Error, Result};
use k8s_openapi::api::core::v1::{Node, PersistentVolume, Pod, Volume};
use kube::ResourceExt;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::trace;

// =============================================================================
// Hostpath Volume
// =============================================================================

/// A persistent volume resolved as hostpath storage
#[derive(Debug, Clone)]
pub struct HostPathVolume {
    /// Backing PersistentVolume
    pub pv: Arc<PersistentVolume>,
    /// Sharing and retention classification
    pub class: VolumeClass,
    /// Declared capacity in bytes
    pub capacity_bytes: u64,
    /// Recorded directories, `empty` unset
    pub records: Vec<MountRecord>,
}

impl HostPathVolume {
    pub fn name(&self) -> String {
        self.pv.name_any()
    }
}

// =============================================================================
// Placement Model
// =============================================================================

/// Read-side model over the cluster cache and hostpath metadata
#[derive(Clone)]
pub struct PlacementModel {
    cache: ClusterCacheRef,
    volumes: VolumeMetadataReaderRef,
    disks: NodeDiskProviderRef,
}

impl PlacementModel {
    /// Create a new model
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

    /// Whether every resource the model reads has completed its initial sync
    pub fn has_synced(&self) -> bool {
        [
            ResourceKind::Pod,
            ResourceKind::PersistentVolume,
            ResourceKind::PersistentVolumeClaim,
        ]
        .into_iter()
        .all(|kind| self.cache.has_synced(kind))
    }

    /// Raw disk partitions of a node
    pub fn node_partitions(&self, node: &Node) -> Result<Vec<DiskPartition>> {
        self.disks.partitions(node)
    }

    /// Classify a hostpath volume
    pub fn classify(&self, pv: &PersistentVolume) -> Result<VolumeClass> {
        self.volumes.classify(pv)
    }

    /// Resolve one pod volume to a hostpath volume, if it is one
    ///
    /// Volumes that are not claims, claims not yet bound, and non-hostpath
    /// volumes resolve to `None`.
    pub fn resolve(&self, pod: &Pod, volume: &Volume) -> Result<Option<HostPathVolume>> {
        let Some(source) = volume.persistent_volume_claim.as_ref() else {
            return Ok(None);
        };
        let namespace = pod.namespace().unwrap_or_default();

        let Some(pv) = self.bound_volume(&namespace, &source.claim_name)? else {
            return Ok(None);
        };
        if !self.volumes.is_hostpath(&pv) {
            return Ok(None);
        }

        let class = self.volumes.classify(&pv)?;
        let capacity_bytes = self.volumes.capacity(&pv)?;
        let records = self.volumes.mount_records(&pv)?;

        Ok(Some(HostPathVolume {
            pv,
            class,
            capacity_bytes,
            records,
        }))
    }

    /// Resolve every hostpath volume the pod references, in spec order
    pub fn resolve_all(&self, pod: &Pod) -> Result<Vec<HostPathVolume>> {
        let mut resolved = Vec::new();
        for volume in pod_volumes(pod) {
            if let Some(hostpath) = self.resolve(pod, volume)? {
                resolved.push(hostpath);
            }
        }
        Ok(resolved)
    }

    /// Mount records of the volume with their `empty` flag derived from the
    /// live consumers on each node
    pub fn mount_records(&self, volume: &HostPathVolume) -> Result<Vec<MountRecord>> {
        let consumers = self.consumers(volume)?;
        Ok(annotate_empty(&volume.records, volume.class.sharing, &consumers))
    }

    /// Whether the volume has a recorded directory on `node` that no live
    /// pod consumes
    pub fn is_empty_on_node(&self, volume: &HostPathVolume, node: &str) -> Result<bool> {
        if !volume.records.iter().any(|r| r.node_name == node) {
            return Ok(false);
        }
        Ok(self
            .mount_records(volume)?
            .iter()
            .any(|r| r.node_name == node && r.empty))
    }

    /// Nodes running at least one live consumer of the volume
    pub fn active_nodes(&self, volume: &HostPathVolume) -> Result<BTreeSet<String>> {
        Ok(self.consumers(volume)?.into_keys().collect())
    }

    /// Live consumers of the volume on `node`, as namespace/name keys
    pub fn consumers_on_node(&self, volume: &HostPathVolume, node: &str) -> Result<Vec<String>> {
        Ok(self
            .consumers(volume)?
            .remove(node)
            .unwrap_or_default())
    }

    /// Mount records of every hostpath volume that target `node`
    pub fn node_mount_records(&self, node: &str) -> Result<Vec<MountRecord>> {
        let mut records = Vec::new();
        for pv in self.cache.list_persistent_volumes()? {
            if !self.volumes.is_hostpath(&pv) {
                continue;
            }
            records.extend(
                self.volumes
                    .mount_records(&pv)?
                    .into_iter()
                    .filter(|r| r.node_name == node),
            );
        }
        Ok(records)
    }

    /// Live consumers of the volume grouped by node
    fn consumers(&self, volume: &HostPathVolume) -> Result<BTreeMap<String, Vec<String>>> {
        let pv_name = volume.name();
        let mut by_node: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for pod in self.cache.list_pods()? {
            let Some(node) = live_node(&pod) else {
                continue;
            };
            let namespace = pod.namespace().unwrap_or_default();

            for pod_volume in pod_volumes(&pod) {
                let Some(source) = pod_volume.persistent_volume_claim.as_ref() else {
                    continue;
                };
                let claim = self
                    .cache
                    .get_persistent_volume_claim(&namespace, &source.claim_name)?;
                let bound = claim
                    .as_ref()
                    .and_then(|c| c.spec.as_ref())
                    .and_then(|spec| spec.volume_name.as_deref());
                if bound == Some(pv_name.as_str()) {
                    by_node
                        .entry(node.to_string())
                        .or_default()
                        .push(format!("{}/{}", namespace, pod.name_any()));
                    break;
                }
            }
        }

        trace!(volume = %pv_name, nodes = ?by_node.keys(), "Resolved live consumers");
        Ok(by_node)
    }

    /// PersistentVolume bound to a claim, `None` while the claim is unbound
    fn bound_volume(&self, namespace: &str, claim: &str) -> Result<Option<Arc<PersistentVolume>>> {
        let pvc = self
            .cache
            .get_persistent_volume_claim(namespace, claim)?
            .ok_or_else(|| Error::ResourceNotFound {
                kind: ResourceKind::PersistentVolumeClaim.to_string(),
                name: format!("{}/{}", namespace, claim),
            })?;

        let volume_name = pvc
            .spec
            .as_ref()
            .and_then(|spec| spec.volume_name.clone())
            .filter(|name| !name.is_empty());
        let Some(volume_name) = volume_name else {
            return Ok(None);
        };

        self.cache
            .get_persistent_volume(&volume_name)?
            .map(Some)
            .ok_or_else(|| Error::ResourceNotFound {
                kind: ResourceKind::PersistentVolume.to_string(),
                name: volume_name,
            })
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Volumes declared in the pod spec
pub fn pod_volumes(pod: &Pod) -> &[Volume] {
    pod.spec
        .as_ref()
        .and_then(|spec| spec.volumes.as_deref())
        .unwrap_or(&[])
}

/// Node of a pod that still holds its volumes
fn live_node(pod: &Pod) -> Option<&str> {
    let node = pod
        .spec
        .as_ref()
        .and_then(|spec| spec.node_name.as_deref())
        .filter(|name| !name.is_empty())?;

    let phase = pod.status.as_ref().and_then(|s| s.phase.as_deref());
    match phase {
        Some("Succeeded") | Some("Failed") => None,
        _ => Some(node),
    }
}

/// Mark records no live consumer occupies
///
/// A shared directory is occupied as soon as one consumer runs on its node.
/// Exclusive directories are occupied one per consumer in recorded order;
/// the surplus on a node is empty.
fn annotate_empty(
    records: &[MountRecord],
    sharing: SharingMode,
    consumers: &BTreeMap<String, Vec<String>>,
) -> Vec<MountRecord> {
    let mut occupied: BTreeMap<&str, usize> = BTreeMap::new();

    records
        .iter()
        .map(|record| {
            let live = consumers.get(&record.node_name).map_or(0, Vec::len);
            let used = occupied.entry(record.node_name.as_str()).or_insert(0);
            let empty = match sharing {
                SharingMode::Shared => live == 0,
                SharingMode::Exclusive => {
                    let empty = *used >= live;
                    *used += 1;
                    empty
                }
            };
            MountRecord {
                empty,
                ..record.clone()
            }
        })
        .collect()
}
