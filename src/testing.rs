//! Test fixtures for building cluster snapshots

use crate::cluster::{ClusterSnapshot, SnapshotCache};
use crate::domain::ports::{RetentionMode, SharingMode};
use crate::hostpath::{
    AnnotationDiskProvider, AnnotationVolumeReader, MountListEntry, PlacementModel,
    DISK_INFO_ANNOTATION, MOUNT_LIST_ANNOTATION, MOUNT_POLICY_ANNOTATION,
    QUOTA_FOR_ONE_POD_ANNOTATION,
};
use crate::scheduling::PluginContext;
use k8s_openapi::api::core::v1::{
    Container, HostPathVolumeSource, NFSVolumeSource, Node, PersistentVolume,
    PersistentVolumeClaim, PersistentVolumeClaimSpec, PersistentVolumeClaimVolumeSource,
    PersistentVolumeSpec, Pod, PodSpec, PodStatus, Volume,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A directory entry to record on a fixture volume
#[derive(Debug, Clone, Copy)]
pub struct MountSpec {
    pub node: &'static str,
    pub host_path: Option<&'static str>,
    pub quota: u64,
}

impl MountSpec {
    pub fn at(node: &'static str, host_path: &'static str, quota: u64) -> Self {
        Self {
            node,
            host_path: Some(host_path),
            quota,
        }
    }

    pub fn unknown_path(node: &'static str, quota: u64) -> Self {
        Self {
            node,
            host_path: None,
            quota,
        }
    }
}

pub fn hostpath_pv(
    name: &str,
    sharing: SharingMode,
    retention: RetentionMode,
    capacity: u64,
    mounts: &[MountSpec],
) -> PersistentVolume {
    let entries: Vec<MountListEntry> = mounts
        .iter()
        .map(|m| MountListEntry {
            host_path: m.host_path.unwrap_or_default().to_string(),
            node_name: m.node.to_string(),
            volume_quota_size: m.quota,
        })
        .collect();

    let mut annotations = BTreeMap::new();
    annotations.insert(
        MOUNT_POLICY_ANNOTATION.to_string(),
        match retention {
            RetentionMode::Keep => "keep",
            RetentionMode::Ephemeral => "none",
        }
        .to_string(),
    );
    annotations.insert(
        QUOTA_FOR_ONE_POD_ANNOTATION.to_string(),
        (sharing == SharingMode::Exclusive).to_string(),
    );
    annotations.insert(
        MOUNT_LIST_ANNOTATION.to_string(),
        serde_json::to_string(&entries).unwrap(),
    );

    PersistentVolume {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            annotations: Some(annotations),
            ..Default::default()
        },
        spec: Some(PersistentVolumeSpec {
            host_path: Some(HostPathVolumeSource {
                path: format!("/xfs/{}", name),
                ..Default::default()
            }),
            capacity: Some(
                [("storage".to_string(), Quantity(capacity.to_string()))]
                    .into_iter()
                    .collect(),
            ),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn nfs_pv(name: &str) -> PersistentVolume {
    PersistentVolume {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        spec: Some(PersistentVolumeSpec {
            nfs: Some(NFSVolumeSource {
                path: "/exports".into(),
                server: "nfs.local".into(),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn claim(namespace: &str, name: &str, volume: Option<&str>) -> PersistentVolumeClaim {
    PersistentVolumeClaim {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        spec: Some(PersistentVolumeClaimSpec {
            volume_name: volume.map(String::from),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// A pod mounting `claims`; running on `node` when given, pending otherwise
pub fn pod(namespace: &str, name: &str, node: Option<&str>, claims: &[&str]) -> Pod {
    let volumes = claims
        .iter()
        .enumerate()
        .map(|(i, claim)| Volume {
            name: format!("vol-{}", i),
            persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                claim_name: claim.to_string(),
                ..Default::default()
            }),
            ..Default::default()
        })
        .collect();

    Pod {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        spec: Some(PodSpec {
            node_name: node.map(String::from),
            containers: vec![Container {
                name: "main".into(),
                image: Some("busybox".into()),
                ..Default::default()
            }],
            volumes: Some(volumes),
            ..Default::default()
        }),
        status: Some(PodStatus {
            phase: Some(if node.is_some() { "Running" } else { "Pending" }.into()),
            ..Default::default()
        }),
    }
}

pub fn node(name: &str) -> Node {
    Node {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// A node advertising `(mount path, allocable, disabled)` partitions
pub fn node_with_disks(name: &str, disks: &[(&str, u64, bool)]) -> Node {
    let partitions: Vec<serde_json::Value> = disks
        .iter()
        .map(|(path, allocable, disabled)| {
            serde_json::json!({
                "mountPath": path,
                "allocable": allocable,
                "disabled": disabled,
            })
        })
        .collect();

    let mut node = node(name);
    node.metadata.annotations = Some(
        [(
            DISK_INFO_ANNOTATION.to_string(),
            serde_json::Value::Array(partitions).to_string(),
        )]
        .into_iter()
        .collect(),
    );
    node
}

/// Builder of a snapshot-backed cluster
#[derive(Debug, Default)]
pub struct ClusterFixture {
    snapshot: ClusterSnapshot,
}

impl ClusterFixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_volume(
        mut self,
        name: &str,
        sharing: SharingMode,
        retention: RetentionMode,
        capacity: u64,
        mounts: &[MountSpec],
    ) -> Self {
        self.snapshot
            .persistent_volumes
            .push(hostpath_pv(name, sharing, retention, capacity, mounts));
        self
    }

    pub fn with_claim(mut self, namespace: &str, name: &str, volume: &str) -> Self {
        self.snapshot
            .persistent_volume_claims
            .push(claim(namespace, name, Some(volume)));
        self
    }

    pub fn with_unbound_claim(mut self, namespace: &str, name: &str) -> Self {
        self.snapshot
            .persistent_volume_claims
            .push(claim(namespace, name, None));
        self
    }

    /// A non-hostpath volume bound to a claim
    pub fn with_plain_volume(mut self, volume: &str, namespace: &str, name: &str) -> Self {
        self.snapshot.persistent_volumes.push(nfs_pv(volume));
        self.with_claim(namespace, name, volume)
    }

    pub fn with_pod(mut self, pod: Pod) -> Self {
        self.snapshot.pods.push(pod);
        self
    }

    pub fn with_node(mut self, node: Node) -> Self {
        self.snapshot.nodes.push(node);
        self
    }

    pub fn cache(&self) -> Arc<SnapshotCache> {
        Arc::new(SnapshotCache::new(self.snapshot.clone()))
    }

    pub fn model(&self) -> PlacementModel {
        PlacementModel::new(
            self.cache(),
            Arc::new(AnnotationVolumeReader::new()),
            Arc::new(AnnotationDiskProvider::new()),
        )
    }

    pub fn context(&self) -> PluginContext {
        PluginContext::new(
            self.cache(),
            Arc::new(AnnotationVolumeReader::new()),
            Arc::new(AnnotationDiskProvider::new()),
        )
    }
}
