//! Hostpath Disk Use
//!
//! Favors nodes with the largest share of quota partition space not yet
//! reserved by hostpath directories.

use super::fanout::{normalize_proportional, score_concurrently};
use crate::error::Result;
use crate::extender::types::HostPriorityList;
use crate::hostpath::PlacementModel;
use crate::scheduling::plugin::{ModelSlot, Plugin, PluginContext, Priority};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Node, Pod};
use kube::ResourceExt;
use std::sync::Arc;
use tracing::trace;

/// Registered name
pub const DISK_USE_PRIORITY: &str = "hostpathpvdiskuse";

/// Percentage of `allocable` left after `reserved`, rounded down
pub fn free_percentage(allocable: u64, reserved: u64) -> i64 {
    if allocable == 0 || allocable <= reserved {
        return 0;
    }
    ((allocable - reserved) as u128 * 100 / allocable as u128) as i64
}

/// Priority favoring nodes with free quota space
#[derive(Default)]
pub struct HostPathDiskUse {
    model: ModelSlot,
}

impl HostPathDiskUse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw score of one node
    pub fn raw_score(model: &PlacementModel, node: &Node) -> Result<i64> {
        let name = node.name_any();
        let allocable = model
            .node_partitions(node)?
            .iter()
            .fold(0u64, |acc, p| acc.saturating_add(p.allocable));
        let reserved = model
            .node_mount_records(&name)?
            .iter()
            .fold(0u64, |acc, r| acc.saturating_add(r.quota_bytes));

        let raw = free_percentage(allocable, reserved);
        trace!(node = %name, allocable, reserved, raw, "Disk use raw score");
        Ok(raw)
    }
}

#[async_trait]
impl Plugin for HostPathDiskUse {
    fn name(&self) -> &str {
        DISK_USE_PRIORITY
    }

    fn ready(&self) -> bool {
        self.model.ready()
    }

    async fn init(&self, ctx: &PluginContext) -> Result<()> {
        self.model.install(ctx);
        Ok(())
    }
}

#[async_trait]
impl Priority for HostPathDiskUse {
    async fn score_nodes(&self, pod: Arc<Pod>, nodes: &[Node]) -> Result<HostPriorityList> {
        let model = self.model.get(DISK_USE_PRIORITY)?;
        score_concurrently(
            DISK_USE_PRIORITY,
            pod,
            nodes,
            move |_, node| Self::raw_score(&model, node),
            normalize_proportional,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{RetentionMode::*, SharingMode::*};
    use crate::error::Error;
    use crate::testing::{node, node_with_disks, pod, ClusterFixture, MountSpec};
    use assert_matches::assert_matches;

    const GIB: u64 = 1 << 30;

    #[test]
    fn test_free_percentage() {
        assert_eq!(free_percentage(0, 0), 0);
        assert_eq!(free_percentage(100, 100), 0);
        assert_eq!(free_percentage(100, 150), 0);
        assert_eq!(free_percentage(100, 50), 50);
        assert_eq!(free_percentage(3, 1), 66);
        assert_eq!(free_percentage(u64::MAX, 0), 100);
    }

    #[tokio::test]
    async fn test_scores_favor_free_nodes() {
        let fixture = ClusterFixture::new().with_volume(
            "pv-1",
            Shared,
            Keep,
            2 * GIB,
            &[MountSpec::at("node-half", "/xfs/disk1/pv-1", 2 * GIB)],
        );
        let priority = HostPathDiskUse::new();
        priority.init(&fixture.context()).await.unwrap();

        let nodes = vec![
            node("node-none"),
            node_with_disks("node-half", &[("/xfs/disk1", 4 * GIB, false)]),
            node_with_disks("node-free", &[("/xfs/disk1", 4 * GIB, false)]),
        ];
        let scores = priority
            .score_nodes(Arc::new(pod("default", "web", None, &[])), &nodes)
            .await
            .unwrap();

        let hosts: Vec<&str> = scores.iter().map(|s| s.host.as_str()).collect();
        assert_eq!(hosts, vec!["node-none", "node-half", "node-free"]);
        let values: Vec<i64> = scores.iter().map(|s| s.score).collect();
        assert_eq!(values, vec![0, 5, 10]);
    }

    #[test]
    fn test_huge_sizes_saturate() {
        let fixture = ClusterFixture::new().with_volume(
            "pv-1",
            Shared,
            Keep,
            u64::MAX,
            &[
                MountSpec::at("node-a", "/xfs/disk1/pv-1", u64::MAX),
                MountSpec::at("node-a", "/xfs/disk2/pv-1", u64::MAX),
            ],
        );
        let model = fixture.model();

        let roomy = node_with_disks(
            "node-b",
            &[("/xfs/disk1", u64::MAX, false), ("/xfs/disk2", u64::MAX, false)],
        );
        assert_eq!(HostPathDiskUse::raw_score(&model, &roomy).unwrap(), 100);

        let full = node_with_disks("node-a", &[("/xfs/disk1", u64::MAX, false)]);
        assert_eq!(HostPathDiskUse::raw_score(&model, &full).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unreadable_disk_info_fails_call() {
        let priority = HostPathDiskUse::new();
        priority.init(&ClusterFixture::new().context()).await.unwrap();

        let mut broken = node("node-b");
        broken.metadata.annotations = Some(
            [(crate::hostpath::DISK_INFO_ANNOTATION.to_string(), "{not json".to_string())]
                .into_iter()
                .collect(),
        );
        let nodes = vec![node_with_disks("node-a", &[("/xfs/disk1", GIB, false)]), broken];

        let err = priority
            .score_nodes(Arc::new(pod("default", "web", None, &[])), &nodes)
            .await
            .unwrap_err();
        assert_matches!(err, Error::Scoring { ref partial, .. } => {
            assert_eq!(partial.len(), 2);
            assert_eq!(partial[0].score, 100);
        });
    }

    #[tokio::test]
    async fn test_uninitialized_priority_errors() {
        let priority = HostPathDiskUse::new();
        let err = priority
            .score_nodes(Arc::new(pod("default", "web", None, &[])), &[node("node-a")])
            .await
            .unwrap_err();
        assert_matches!(err, Error::PluginNotInitialized { .. });
    }
}
