//! Cardinality limiting for metric backends.
//!
//! Each metric name gets a HyperLogLog sketch of the tag-sets seen for it.
//! Once a sketch estimates the limit has been reached, the whole metric name
//! is dropped from outgoing batches until the registry is reset.

pub mod backend;
pub mod config;
pub mod estimator;
pub mod registry;
pub mod reset;

pub use backend::*;
pub use config::*;
pub use estimator::*;
pub use registry::*;
pub use reset::*;
