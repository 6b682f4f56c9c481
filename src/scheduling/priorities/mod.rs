//! Hostpath Priorities
//!
//! Node rankings computed concurrently across the candidate list.

pub mod disk_use;
pub mod fanout;
pub mod spread;

pub use disk_use::*;
pub use fanout::*;
pub use spread::*;
