//! Thread-safe HyperLogLog wrapper.

use hyperloglog::HyperLogLog;
use parking_lot::RwLock;

use guard_core::limits::DEFAULT_SKETCH_ERROR_RATE;

/// Approximate distinct counter for the tag-sets of one metric name.
pub struct CardinalityEstimator {
    sketch: RwLock<HyperLogLog>,
}

impl CardinalityEstimator {
    pub fn new() -> Self {
        Self::with_error_rate(DEFAULT_SKETCH_ERROR_RATE)
    }

    pub fn with_error_rate(error_rate: f64) -> Self {
        Self {
            sketch: RwLock::new(HyperLogLog::new(error_rate)),
        }
    }

    /// Adds an identity to the sketch.
    pub fn insert(&self, identity: &[u8]) {
        self.sketch.write().insert(&identity);
    }

    /// Approximate number of distinct identities inserted.
    pub fn estimate(&self) -> u64 {
        let estimate = self.sketch.read().len();
        if estimate.is_finite() && estimate > 0.0 {
            estimate.round() as u64
        } else {
            0
        }
    }
}

impl Default for CardinalityEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CardinalityEstimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CardinalityEstimator")
            .field("estimate", &self.estimate())
            .finish()
    }
}
