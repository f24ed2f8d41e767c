//! Default limits for cardinality limiting.
//!
//! These bound how much sketch memory a single backend wrapper may hold and
//! how long a metric name stays blocked once it crosses its limit.
//!
//! # Sizing
//!
//! One estimator uses 2^12 one-byte registers (4KB). With 10k metric names
//! tracked between resets that is ~40MB in the worst case, which is why the
//! registry is dropped wholesale every `DEFAULT_CLEAR_AFTER_SECS`.

/// Default distinct tag-set threshold per metric name.
pub const DEFAULT_LIMIT: u64 = 10_000;

/// Default interval between full registry resets (1 hour).
pub const DEFAULT_CLEAR_AFTER_SECS: u64 = 3600;

/// Error rate requested from each HyperLogLog sketch.
///
/// The sketch derives its register count from this value; 0.0041 lands on
/// 2^12 registers, a ~1.6% standard error.
pub const DEFAULT_SKETCH_ERROR_RATE: f64 = 0.0041;

/// Initial registry capacity.
pub const REGISTRY_INITIAL_CAPACITY: usize = 100;
