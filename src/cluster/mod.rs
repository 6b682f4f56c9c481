//! Cluster Cache Module
//!
//! Adapters implementing the read-only cluster cache port: a live
//! reflector-backed cache and a static snapshot for standalone runs.

pub mod kube_cache;
pub mod snapshot;

pub use kube_cache::*;
pub use snapshot::*;
