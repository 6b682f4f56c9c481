//! Scheduler Extender Wire Types
//!
//! JSON bodies exchanged with kube-scheduler's extender callbacks.

use indexmap::IndexMap;
use k8s_openapi::api::core::v1::{Node, Pod};
use serde::{Deserialize, Serialize};

/// Candidate nodes in `NodeList` form
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeItems {
    #[serde(default)]
    pub items: Vec<Node>,
}

/// Arguments of a filter or prioritize callback
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtenderArgs {
    /// Pod being scheduled
    pub pod: Pod,
    /// Full candidate node objects
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodes: Option<NodeItems>,
    /// Candidate node names, sent instead of `nodes` by node-cache-capable
    /// extender configurations
    #[serde(default, rename = "nodenames", skip_serializing_if = "Option::is_none")]
    pub node_names: Option<Vec<String>>,
}

/// Failure reason per rejected node, in evaluation order
pub type FailedNodes = IndexMap<String, String>;

/// Response of a filter callback
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtenderFilterResult {
    /// Admitted nodes, when the request carried node objects
    pub nodes: Option<NodeItems>,
    /// Admitted node names, when the request carried names only
    #[serde(default, rename = "nodenames", skip_serializing_if = "Option::is_none")]
    pub node_names: Option<Vec<String>>,
    pub failed_nodes: Option<FailedNodes>,
    #[serde(default)]
    pub error: String,
}

impl ExtenderFilterResult {
    /// A result carrying only an error message
    pub fn from_error(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            ..Default::default()
        }
    }
}

/// Score of one node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostPriority {
    pub host: String,
    pub score: i64,
}

pub type HostPriorityList = Vec<HostPriority>;
