//! Error types for the hostpath scheduler extender
//!
//! Provides structured error types for cache lookups, volume classification,
//! capacity admission, the plugin registries and the extender API.

use crate::extender::types::HostPriority;
use thiserror::Error;

/// Unified error type for the extender
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // =========================================================================
    // Kubernetes / Cache Lookup Errors
    // =========================================================================
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("Resource not found: {kind}/{name}")]
    ResourceNotFound { kind: String, name: String },

    #[error("Lookup of {kind}/{name} failed: {reason}")]
    Lookup {
        kind: String,
        name: String,
        reason: String,
    },

    #[error("Cache for {kind} is not synced")]
    CacheNotSynced { kind: String },

    // =========================================================================
    // Hostpath Volume Errors
    // =========================================================================
    #[error("Cannot classify volume {volume}: {reason}")]
    Classification { volume: String, reason: String },

    #[error("Invalid annotation {key} on {object}: {reason}")]
    InvalidAnnotation {
        object: String,
        key: String,
        reason: String,
    },

    #[error("Disk info of node {node} unavailable: {reason}")]
    NodeDiskInfo { node: String, reason: String },

    // =========================================================================
    // Capacity Errors
    // =========================================================================
    #[error("Insufficient capacity on node {node}: requested {requested} bytes, allocable {allocable} bytes")]
    InsufficientCapacity {
        node: String,
        requested: u64,
        allocable: u64,
    },

    #[error("Requests {requests:?} do not fit partitions {partitions:?} on node {node}")]
    PartitionMismatch {
        node: String,
        requests: Vec<u64>,
        partitions: Vec<u64>,
    },

    // =========================================================================
    // Plugin Errors
    // =========================================================================
    #[error("Predicate {plugin} failed on node {node}: {source}")]
    Predicate {
        plugin: String,
        node: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Priority {plugin} failed for pod {pod}: {}", .reasons.join("; "))]
    Scoring {
        plugin: String,
        pod: String,
        /// Raw per-node scores as they stood when the failure was detected
        partial: Vec<HostPriority>,
        reasons: Vec<String>,
    },

    #[error("Plugin {name} is not initialized")]
    PluginNotInitialized { name: String },

    // =========================================================================
    // Registry Errors
    // =========================================================================
    #[error("{category} plugin name should not be empty")]
    EmptyPluginName { category: String },

    #[error("{category} plugin {name} is already registered")]
    DuplicatePlugin { category: String, name: String },

    #[error("Cannot register {category} plugin {name}: registry is already initialized")]
    RegistryInitialized { category: String, name: String },

    #[error("Init of {category} plugin {name} failed: {reason}")]
    PluginInit {
        category: String,
        name: String,
        reason: String,
    },

    #[error("{category} plugin {name} not found")]
    PluginNotFound { category: String, name: String },

    // =========================================================================
    // API Errors
    // =========================================================================
    #[error("API request validation failed: {0}")]
    ApiValidation(String),

    #[error("Extender is not ready")]
    NotReady,

    // =========================================================================
    // Parse Errors
    // =========================================================================
    #[error("Capacity parse error: {0}")]
    CapacityParse(String),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    // =========================================================================
    // IO Errors
    // =========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wrap an error with the predicate and node it was raised for
    pub fn predicate(plugin: &str, node: &str, source: Error) -> Self {
        Error::Predicate {
            plugin: plugin.to_string(),
            node: node.to_string(),
            source: Box::new(source),
        }
    }

    /// Check if this error comes from an upstream lookup rather than a
    /// placement decision
    pub fn is_upstream(&self) -> bool {
        match self {
            Error::Kube(_)
            | Error::ResourceNotFound { .. }
            | Error::Lookup { .. }
            | Error::CacheNotSynced { .. }
            | Error::Classification { .. }
            | Error::InvalidAnnotation { .. }
            | Error::NodeDiskInfo { .. } => true,
            Error::Predicate { source, .. } => source.is_upstream(),
            _ => false,
        }
    }

    /// Check if this error rejects a node for lack of disk space
    pub fn is_capacity(&self) -> bool {
        match self {
            Error::InsufficientCapacity { .. } | Error::PartitionMismatch { .. } => true,
            Error::Predicate { source, .. } => source.is_capacity(),
            _ => false,
        }
    }
}

/// Result type alias for the extender
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predicate_error_attribution() {
        let err = Error::predicate(
            "hostpathpvdiskpressure",
            "node-1",
            Error::InsufficientCapacity {
                node: "node-1".into(),
                requested: 2048,
                allocable: 1024,
            },
        );
        let message = err.to_string();
        assert!(message.contains("hostpathpvdiskpressure"));
        assert!(message.contains("node-1"));
        assert!(message.contains("2048"));
        assert!(err.is_capacity());
        assert!(!err.is_upstream());
    }

    #[test]
    fn test_upstream_classification() {
        let lookup = Error::Lookup {
            kind: "PersistentVolume".into(),
            name: "pv-1".into(),
            reason: "not cached".into(),
        };
        assert!(lookup.is_upstream());

        let ambiguous = Error::Classification {
            volume: "pv-1".into(),
            reason: "unknown mount policy".into(),
        };
        assert!(ambiguous.is_upstream());
        assert!(Error::predicate("p", "n", ambiguous).is_upstream());

        assert!(!Error::NotReady.is_upstream());
    }

    #[test]
    fn test_scoring_error_lists_reasons() {
        let err = Error::Scoring {
            plugin: "hostpathpvspread".into(),
            pod: "default/web-0".into(),
            partial: Vec::new(),
            reasons: vec!["first".into(), "second".into()],
        };
        assert_eq!(
            err.to_string(),
            "Priority hostpathpvspread failed for pod default/web-0: first; second"
        );
    }
}
