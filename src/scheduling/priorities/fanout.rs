//! Concurrent Node Scoring
//!
//! Scores every candidate node on its own tokio task, waits for all of them
//! and merges the outcomes in input order. Any failed node fails the whole
//! call; the raw scores computed so far travel with the error.

use crate::error::{Error, Result};
use crate::extender::types::{HostPriority, HostPriorityList};
use k8s_openapi::api::core::v1::{Node, Pod};
use kube::ResourceExt;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Highest score a priority hands back to the scheduler
pub const MAX_PRIORITY: i64 = 10;

/// Compute raw scores concurrently and normalize them
///
/// `score` runs once per node. `normalize` sees the complete raw list and
/// only runs when every node scored.
pub async fn score_concurrently<F>(
    plugin: &str,
    pod: Arc<Pod>,
    nodes: &[Node],
    score: F,
    normalize: fn(&mut [HostPriority]),
) -> Result<HostPriorityList>
where
    F: Fn(&Pod, &Node) -> Result<i64> + Send + Sync + 'static,
{
    let score = Arc::new(score);

    let handles: Vec<JoinHandle<Result<i64>>> = nodes
        .iter()
        .map(|node| {
            let pod = pod.clone();
            let node = node.clone();
            let score = score.clone();
            tokio::spawn(async move { score(&pod, &node) })
        })
        .collect();

    let outcomes = futures::future::join_all(handles).await;

    let mut scores = Vec::with_capacity(nodes.len());
    let mut reasons = Vec::new();
    for (node, outcome) in nodes.iter().zip(outcomes) {
        let host = node.name_any();
        let raw = match outcome {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                reasons.push(format!("node {}: {}", host, e));
                0
            }
            Err(e) => {
                reasons.push(format!("node {}: scoring task failed: {}", host, e));
                0
            }
        };
        scores.push(HostPriority { host, score: raw });
    }

    if !reasons.is_empty() {
        let pod_key = format!("{}/{}", pod.namespace().unwrap_or_default(), pod.name_any());
        error!(plugin = %plugin, pod = %pod_key, failures = reasons.len(), "Scoring failed");
        return Err(Error::Scoring {
            plugin: plugin.to_string(),
            pod: pod_key,
            partial: scores,
            reasons,
        });
    }

    normalize(&mut scores);
    debug!(plugin = %plugin, pod = %pod.name_any(), scores = ?scores, "Scored nodes");
    Ok(scores)
}

fn max_score(scores: &[HostPriority]) -> i64 {
    scores.iter().map(|s| s.score).max().unwrap_or(0)
}

/// Scale raw scores so the highest maps to [`MAX_PRIORITY`]
pub fn normalize_proportional(scores: &mut [HostPriority]) {
    let max = max_score(scores);
    for entry in scores.iter_mut() {
        entry.score = if max <= 0 {
            0
        } else {
            MAX_PRIORITY * entry.score / max
        };
    }
}

/// Scale raw scores so the lowest maps to [`MAX_PRIORITY`]
pub fn normalize_inverse(scores: &mut [HostPriority]) {
    let max = max_score(scores);
    for entry in scores.iter_mut() {
        entry.score = if max <= 0 {
            MAX_PRIORITY
        } else {
            MAX_PRIORITY * (max - entry.score) / max
        };
    }
}
