//! Hostpath Predicates
//!
//! Node filters evaluated sequentially over the candidate list.

pub mod affinity;
pub mod disk_pressure;

pub use affinity::*;
pub use disk_pressure::*;
