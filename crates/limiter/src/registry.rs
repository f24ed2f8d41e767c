//! Per metric name estimator registry.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use guard_core::limits::{DEFAULT_SKETCH_ERROR_RATE, REGISTRY_INITIAL_CAPACITY};
use telemetry::metrics;

use crate::estimator::CardinalityEstimator;

/// Outcome of a registry check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    /// Estimate observed before the identity was considered
    pub estimate: u64,
    pub admitted: bool,
}

impl Admission {
    fn admit(estimate: u64) -> Self {
        Self {
            estimate,
            admitted: true,
        }
    }

    fn reject(estimate: u64) -> Self {
        Self {
            estimate,
            admitted: false,
        }
    }
}

/// Maps metric names to their cardinality estimators.
///
/// Estimators are created on first sight of a name and only ever discarded
/// all together by `reset`.
pub struct EstimatorRegistry {
    estimators: RwLock<HashMap<String, Arc<CardinalityEstimator>>>,
    error_rate: f64,
}

impl EstimatorRegistry {
    pub fn new() -> Self {
        Self::with_error_rate(DEFAULT_SKETCH_ERROR_RATE)
    }

    pub fn with_error_rate(error_rate: f64) -> Self {
        Self {
            estimators: RwLock::new(HashMap::with_capacity(REGISTRY_INITIAL_CAPACITY)),
            error_rate,
        }
    }

    /// Decides whether `identity` may be recorded for `name` under `limit`,
    /// and records it if so.
    ///
    /// The first identity for a name is always admitted. After that an
    /// identity is admitted while the estimate is strictly below `limit`;
    /// rejected identities are not inserted, so the estimator stops growing
    /// once the name is over its limit.
    pub fn check(&self, name: &str, identity: &[u8], limit: u64) -> Admission {
        let existing = self.estimators.read().get(name).cloned();

        let estimator = match existing {
            Some(estimator) => estimator,
            None => {
                let mut estimators = self.estimators.write();
                let error_rate = self.error_rate;
                let estimator = estimators.entry(name.to_string()).or_insert_with(|| {
                    metrics().estimators_created.inc();
                    metrics().tracked_metric_names.add(1);
                    Arc::new(CardinalityEstimator::with_error_rate(error_rate))
                });
                estimator.insert(identity);
                return Admission::admit(0);
            }
        };

        let estimate = estimator.estimate();
        if estimate < limit {
            estimator.insert(identity);
            Admission::admit(estimate)
        } else {
            Admission::reject(estimate)
        }
    }

    /// Discards every estimator. Returns how many names were tracked.
    pub fn reset(&self) -> usize {
        let fresh = HashMap::with_capacity(REGISTRY_INITIAL_CAPACITY);
        let old = std::mem::replace(&mut *self.estimators.write(), fresh);
        metrics().tracked_metric_names.sub(old.len() as u64);
        old.len()
    }

    /// Number of metric names with an estimator.
    pub fn len(&self) -> usize {
        self.estimators.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.estimators.read().is_empty()
    }

    /// Current estimate for `name`, if it has been seen since the last reset.
    pub fn estimate_for(&self, name: &str) -> Option<u64> {
        let estimator = self.estimators.read().get(name).cloned()?;
        Some(estimator.estimate())
    }
}

impl Default for EstimatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for EstimatorRegistry {
    fn drop(&mut self) {
        metrics()
            .tracked_metric_names
            .sub(self.estimators.get_mut().len() as u64);
    }
}
