//! Node Disk Inventory
//!
//! Derives a node's remaining hostpath capacity by subtracting the quotas
//! of directories already placed on it from its raw partitions.

use super::model::PlacementModel;
use crate::domain::ports::{DiskPartition, MountRecord};
use crate::error::{Error, Result};
use k8s_openapi::api::core::v1::Node;
use kube::ResourceExt;

/// Remaining capacity of a node's quota partitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeDiskInventory {
    /// Node name
    pub node: String,
    /// Sum of remaining partition capacity
    pub total: u64,
    /// Partitions with remaining capacity, ascending by (size, path)
    pub partitions: Vec<DiskPartition>,
}

impl NodeDiskInventory {
    /// Compute the inventory of a node from the model's current snapshot
    pub fn for_node(node: &Node, model: &PlacementModel) -> Result<Self> {
        let name = node.name_any();
        let partitions = model.node_partitions(node).map_err(|e| with_node(&name, e))?;
        if partitions.is_empty() {
            return Ok(Self {
                node: name,
                total: 0,
                partitions,
            });
        }

        let records = model
            .node_mount_records(&name)
            .map_err(|e| with_node(&name, e))?;
        Ok(compute_allocable(&name, partitions, &records))
    }
}

/// Subtract reserved quotas from raw partitions
///
/// A record whose host path is known is charged to the first partition
/// whose mount path prefixes it. A record without a path is charged to
/// every partition since its directory may live on any of them.
pub fn compute_allocable(
    node: &str,
    partitions: Vec<DiskPartition>,
    records: &[MountRecord],
) -> NodeDiskInventory {
    let mut remaining: Vec<i128> = partitions.iter().map(|p| p.allocable as i128).collect();

    for record in records {
        match record.host_path.as_deref() {
            Some(path) => {
                if let Some(i) = partitions
                    .iter()
                    .position(|p| path.starts_with(p.mount_path.as_str()))
                {
                    remaining[i] -= record.quota_bytes as i128;
                }
            }
            None => {
                for size in remaining.iter_mut() {
                    *size -= record.quota_bytes as i128;
                }
            }
        }
    }

    let mut partitions: Vec<DiskPartition> = partitions
        .into_iter()
        .zip(remaining)
        .map(|(partition, size)| DiskPartition {
            allocable: size.clamp(0, u64::MAX as i128) as u64,
            ..partition
        })
        .collect();

    partitions.sort_by(|a, b| {
        a.allocable
            .cmp(&b.allocable)
            .then_with(|| a.mount_path.cmp(&b.mount_path))
    });

    let total = partitions
        .iter()
        .fold(0u64, |acc, p| acc.saturating_add(p.allocable));

    NodeDiskInventory {
        node: node.to_string(),
        total,
        partitions,
    }
}

fn with_node(node: &str, err: Error) -> Error {
    match err {
        Error::NodeDiskInfo { .. } => err,
        other => Error::NodeDiskInfo {
            node: node.to_string(),
            reason: other.to_string(),
        },
    }
}
