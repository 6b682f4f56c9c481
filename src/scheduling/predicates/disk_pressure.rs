//! Hostpath Disk Pressure
//!
//! Admits a node only if the directories the pod still has to create fit
//! into the node's remaining quota partitions.

use crate::error::{Error, Result};
use crate::hostpath::{NodeDiskInventory, PlacementModel};
use crate::scheduling::plugin::{ModelSlot, Plugin, PluginContext, Predicate};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Node, Pod};
use kube::ResourceExt;
use tracing::debug;

/// Registered name
pub const DISK_PRESSURE_PREDICATE: &str = "hostpathpvdiskpressure";

/// Match ascending requests against ascending partition sizes
///
/// Walks both lists with one cursor each. A request that does not fit the
/// current partition moves the partition cursor on, and a partition once
/// skipped is never offered again. Matching partitions are drawn down in
/// place. Returns whether every request was placed.
pub fn can_request_match(requests: &[u64], partitions: &mut [u64]) -> bool {
    let mut request = 0;
    let mut partition = 0;

    while request < requests.len() && partition < partitions.len() {
        if requests[request] <= partitions[partition] {
            partitions[partition] -= requests[request];
            request += 1;
        } else {
            partition += 1;
        }
    }

    request == requests.len()
}

/// Predicate rejecting nodes without room for the pod's new directories
#[derive(Default)]
pub struct HostPathDiskPressure {
    model: ModelSlot,
}

impl HostPathDiskPressure {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capacity the pod still needs on `node`, ascending
    ///
    /// Volumes with an unused directory already on the node need nothing.
    pub fn disk_requests(model: &PlacementModel, pod: &Pod, node: &str) -> Result<Vec<u64>> {
        let mut requests = Vec::new();
        for volume in model.resolve_all(pod)? {
            if model.is_empty_on_node(&volume, node)? {
                debug!(volume = %volume.name(), node = %node, "Reusing unused directory");
                continue;
            }
            requests.push(volume.capacity_bytes);
        }
        requests.sort_unstable();
        Ok(requests)
    }

    fn evaluate(&self, pod: &Pod, node: &Node) -> Result<bool> {
        let model = self.model.get(DISK_PRESSURE_PREDICATE)?;
        let node_name = node.name_any();

        let requests = Self::disk_requests(&model, pod, &node_name)?;
        let requested = requests.iter().fold(0u64, |acc, r| acc.saturating_add(*r));
        if requested == 0 {
            return Ok(true);
        }

        let inventory = NodeDiskInventory::for_node(node, &model)?;
        if requested > inventory.total {
            if inventory.total == 0 {
                debug!(node = %node_name, requested, "Node has no allocable hostpath capacity");
                return Ok(false);
            }
            return Err(Error::InsufficientCapacity {
                node: node_name,
                requested,
                allocable: inventory.total,
            });
        }

        let sizes: Vec<u64> = inventory.partitions.iter().map(|p| p.allocable).collect();
        let mut remaining = sizes.clone();
        if !can_request_match(&requests, &mut remaining) {
            return Err(Error::PartitionMismatch {
                node: node_name,
                requests,
                partitions: sizes,
            });
        }

        debug!(
            pod = %pod.name_any(),
            node = %node_name,
            requests = ?requests,
            partitions = ?sizes,
            "Requests fit node partitions"
        );
        Ok(true)
    }
}

#[async_trait]
impl Plugin for HostPathDiskPressure {
    fn name(&self) -> &str {
        DISK_PRESSURE_PREDICATE
    }

    fn ready(&self) -> bool {
        self.model.ready()
    }

    async fn init(&self, ctx: &PluginContext) -> Result<()> {
        self.model.install(ctx);
        Ok(())
    }
}

impl Predicate for HostPathDiskPressure {
    fn pod_matches_node(&self, pod: &Pod, node: &Node) -> Result<bool> {
        self.evaluate(pod, node)
            .map_err(|e| Error::predicate(DISK_PRESSURE_PREDICATE, &node.name_any(), e))
    }
}
