//! Hostpath Module
//!
//! Classification, bookkeeping and disk inventory of node-local
//! persistent volumes.

pub mod annotations;
pub mod inventory;
pub mod model;

pub use annotations::*;
pub use inventory::*;
pub use model::*;
