//! Scheduling Plugins
//!
//! Plugin contract, the registries owning plugins, and the hostpath
//! predicates and priorities.

pub mod plugin;
pub mod predicates;
pub mod priorities;
pub mod registry;

pub use plugin::*;
pub use predicates::*;
pub use priorities::*;
pub use registry::*;
