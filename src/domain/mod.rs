//! Domain layer - Core types and port definitions
//!
//! This module defines the read contracts (ports) the placement logic
//! consumes and the hostpath bookkeeping types shared by every plugin.

pub mod ports;

pub use ports::*;
