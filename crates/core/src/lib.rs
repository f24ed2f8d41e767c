//! Metric model and backend contract for the cardinality guard.

pub mod backend;
pub mod error;
pub mod event;
pub mod limits;
pub mod metric;

pub use backend::*;
pub use error::{Error, Result};
pub use event::*;
pub use metric::*;
