//! Scheduler Extender
//!
//! Wire types, callback dispatch, HTTP routes, metrics and the server.

pub mod dispatcher;
pub mod metrics;
pub mod routes;
pub mod server;
pub mod types;

pub use dispatcher::Extender;
pub use metrics::ExtenderMetrics;
pub use routes::{ApiErrorResponse, ExtenderRouter};
pub use server::{ExtenderConfig, ExtenderServer};
pub use types::*;
