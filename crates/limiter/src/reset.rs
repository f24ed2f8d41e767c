//! Time-windowed registry reset.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::info;

use telemetry::metrics;

use crate::registry::EstimatorRegistry;

/// Clears a registry once `clear_after` has elapsed since the last clear.
///
/// The last-clear time is kept as milliseconds since construction so it can
/// be swapped atomically; only the caller that wins the swap clears.
pub struct ResetScheduler {
    clear_after: Duration,
    origin: Instant,
    last_clear_ms: AtomicU64,
}

impl ResetScheduler {
    pub fn new(clear_after: Duration) -> Self {
        Self {
            clear_after,
            origin: Instant::now(),
            last_clear_ms: AtomicU64::new(0),
        }
    }

    pub fn clear_after(&self) -> Duration {
        self.clear_after
    }

    /// Time since the last clear, as seen at `now`.
    pub fn since_last_clear(&self, now: Instant) -> Duration {
        let last = Duration::from_millis(self.last_clear_ms.load(Ordering::Acquire));
        self.elapsed_ms(now).checked_sub(last).unwrap_or_default()
    }

    /// Whether a clear is due at `now`.
    pub fn is_due(&self, now: Instant) -> bool {
        self.since_last_clear(now) > self.clear_after
    }

    /// Clears `registry` if the window has elapsed.
    pub fn maybe_reset(&self, registry: &EstimatorRegistry) -> bool {
        self.maybe_reset_at(registry, Instant::now())
    }

    /// Clears `registry` if the window has elapsed at `now`. Returns `true`
    /// for the single caller that performed the clear.
    pub fn maybe_reset_at(&self, registry: &EstimatorRegistry, now: Instant) -> bool {
        let last = self.last_clear_ms.load(Ordering::Acquire);
        let now_ms = self.elapsed_ms(now).as_millis() as u64;

        if Duration::from_millis(now_ms.saturating_sub(last)) <= self.clear_after {
            return false;
        }

        if self
            .last_clear_ms
            .compare_exchange(last, now_ms, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            // Another caller already cleared for this window.
            return false;
        }

        let discarded = registry.reset();
        metrics().registry_resets.inc();
        info!(
            discarded_metric_names = discarded,
            clear_after_secs = self.clear_after.as_secs(),
            "Cleared cardinality estimators"
        );
        true
    }

    fn elapsed_ms(&self, now: Instant) -> Duration {
        let elapsed = now.saturating_duration_since(self.origin);
        Duration::from_millis(elapsed.as_millis() as u64)
    }
}
