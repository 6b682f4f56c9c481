//! Hostpath Volume Spread
//!
//! Favors nodes where fewer running pods already use the pod's hostpath
//! volumes, spreading consumers of the same volume across nodes.

use super::fanout::{normalize_inverse, score_concurrently};
use crate::domain::ports::SharingMode;
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
pub const SPREAD_PRIORITY: &str = "hostpathpvspread";

/// Priority spreading consumers of a volume
#[derive(Default)]
pub struct HostPathSpread {
    model: ModelSlot,
}

impl HostPathSpread {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw score of one node: how crowded it already is with the pod's volumes
    ///
    /// A shared volume counts once however many pods use it on the node.
    pub fn raw_score(model: &PlacementModel, pod: &Pod, node: &Node) -> Result<i64> {
        let name = node.name_any();
        let mut raw = 0i64;

        for volume in model.resolve_all(pod)? {
            let consumers = model.consumers_on_node(&volume, &name)?.len() as i64;
            raw += match volume.class.sharing {
                SharingMode::Shared => consumers.min(1),
                SharingMode::Exclusive => consumers,
            };
        }

        trace!(node = %name, raw, "Spread raw score");
        Ok(raw)
    }
}

#[async_trait]
impl Plugin for HostPathSpread {
    fn name(&self) -> &str {
        SPREAD_PRIORITY
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
impl Priority for HostPathSpread {
    async fn score_nodes(&self, pod: Arc<Pod>, nodes: &[Node]) -> Result<HostPriorityList> {
        let model = self.model.get(SPREAD_PRIORITY)?;
        score_concurrently(
            SPREAD_PRIORITY,
            pod,
            nodes,
            move |pod, node| Self::raw_score(&model, pod, node),
            normalize_inverse,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{RetentionMode::*, SharingMode::*};
    use crate::error::Error;
    use crate::testing::{node, pod, ClusterFixture};
    use assert_matches::assert_matches;

    fn crowded_fixture() -> ClusterFixture {
        ClusterFixture::new()
            .with_volume("pv-shared", Shared, Keep, 1024, &[])
            .with_volume("pv-excl", Exclusive, Ephemeral, 1024, &[])
            .with_claim("default", "shared", "pv-shared")
            .with_claim("default", "excl", "pv-excl")
            // node-b: two shared consumers count once, one exclusive
            .with_pod(pod("default", "s-0", Some("node-b"), &["shared"]))
            .with_pod(pod("default", "s-1", Some("node-b"), &["shared"]))
            .with_pod(pod("default", "e-0", Some("node-b"), &["excl"]))
            // node-c: one shared, three exclusive
            .with_pod(pod("default", "s-2", Some("node-c"), &["shared"]))
            .with_pod(pod("default", "e-1", Some("node-c"), &["excl"]))
            .with_pod(pod("default", "e-2", Some("node-c"), &["excl"]))
            .with_pod(pod("default", "e-3", Some("node-c"), &["excl"]))
    }

    #[test]
    fn test_raw_scores_count_consumers() {
        let fixture = crowded_fixture();
        let model = fixture.model();
        let pending = pod("default", "new", None, &["shared", "excl"]);

        let raw: Vec<i64> = ["node-a", "node-b", "node-c"]
            .iter()
            .map(|n| HostPathSpread::raw_score(&model, &pending, &node(n)).unwrap())
            .collect();
        assert_eq!(raw, vec![0, 2, 4]);
    }

    #[tokio::test]
    async fn test_scores_favor_empty_nodes() {
        let fixture = crowded_fixture();
        let priority = HostPathSpread::new();
        priority.init(&fixture.context()).await.unwrap();

        let nodes = vec![node("node-a"), node("node-b"), node("node-c")];
        let scores = priority
            .score_nodes(
                Arc::new(pod("default", "new", None, &["shared", "excl"])),
                &nodes,
            )
            .await
            .unwrap();

        let values: Vec<i64> = scores.iter().map(|s| s.score).collect();
        assert_eq!(values, vec![10, 5, 0]);
    }

    #[tokio::test]
    async fn test_pod_without_hostpath_volumes_scores_max() {
        let priority = HostPathSpread::new();
        priority.init(&crowded_fixture().context()).await.unwrap();

        let scores = priority
            .score_nodes(
                Arc::new(pod("default", "new", None, &[])),
                &[node("node-b"), node("node-c")],
            )
            .await
            .unwrap();
        assert!(scores.iter().all(|s| s.score == 10));
    }

    #[tokio::test]
    async fn test_lookup_failure_fails_call() {
        let priority = HostPathSpread::new();
        priority.init(&crowded_fixture().context()).await.unwrap();

        let err = priority
            .score_nodes(
                Arc::new(pod("default", "new", None, &["missing"])),
                &[node("node-a")],
            )
            .await
            .unwrap_err();
        assert_matches!(err, Error::Scoring { ref reasons, .. } if reasons.len() == 1);
    }
}
