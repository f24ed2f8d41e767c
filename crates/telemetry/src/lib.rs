//! Internal telemetry for the cardinality guard.
//!
//! Limiter decisions are counted in-process and reported through tracing,
//! so a blocked metric name is visible without depending on the backend
//! that is dropping it.

pub mod metrics;
pub mod tracing_setup;

pub use metrics::*;
pub use tracing_setup::*;
