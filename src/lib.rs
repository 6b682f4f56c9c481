//! Hostpath Scheduler Extender
//!
//! A kube-scheduler extender placing pods that use hostpath-backed
//! PersistentVolumes. It keeps pods next to the directories their volumes
//! already own, rejects nodes without room for new directories, and ranks
//! nodes by free quota space and by how crowded they are with a volume's
//! consumers.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                 kube-scheduler extender callbacks                    │
//! │        POST /{prefix}/predicates/{name}   /{prefix}/priorities/{name}│
//! ├──────────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────────────────┐     ┌───────────────────────────────┐  │
//! │  │   Predicate Registry     │     │      Priority Registry        │  │
//! │  │  hostpathpvaffinity      │     │  hostpathpvdiskuse            │  │
//! │  │  hostpathpvdiskpressure  │     │  hostpathpvspread             │  │
//! │  │  (sequential per node)   │     │  (one task per node)          │  │
//! │  └────────────┬─────────────┘     └───────────────┬───────────────┘  │
//! │               └──────────────┬────────────────────┘                  │
//! │                  ┌───────────┴───────────┐                           │
//! │                  │    Placement Model    │                           │
//! │                  │  + Node Disk Inventory│                           │
//! │                  └───────────┬───────────┘                           │
//! ├──────────────────────────────┼───────────────────────────────────────┤
//! │   Cluster Cache (kube reflectors or snapshot)  │  Annotation readers │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`extender`]: Wire types, dispatch, HTTP routes and server
//! - [`scheduling`]: Plugin contract, registries, predicates and priorities
//! - [`hostpath`]: Volume resolution, usage bookkeeping and disk inventory
//! - [`cluster`]: Cluster cache adapters
//! - [`domain`]: Core domain types and ports
//! - [`error`]: Error types and handling

pub mod cluster;
pub mod domain;
pub mod error;
pub mod extender;
pub mod hostpath;
pub mod scheduling;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use cluster::{ClusterSnapshot, KubeCache, SnapshotCache};

pub use domain::ports::{
    ClusterCache, DiskPartition, MountRecord, NodeDiskProvider, ResourceKind, RetentionMode,
    SharingMode, VolumeClass, VolumeMetadataReader,
};

pub use error::{Error, Result};

pub use extender::{
    Extender, ExtenderArgs, ExtenderConfig, ExtenderFilterResult, ExtenderMetrics,
    ExtenderRouter, ExtenderServer, HostPriority, HostPriorityList,
};

pub use hostpath::{
    AnnotationDiskProvider, AnnotationVolumeReader, HostPathVolume, NodeDiskInventory,
    PlacementModel,
};

pub use scheduling::{
    can_request_match, Plugin, PluginCategory, PluginContext, PluginRegistry, Predicate,
    Priority,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
