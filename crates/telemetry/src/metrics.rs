//! Internal limiter metrics.
//!
//! Counters are process-global and shared by every wrapped backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// A counter metric.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// A gauge metric (can go up or down).
#[derive(Debug, Default)]
pub struct Gauge(AtomicU64);

impl Gauge {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn add(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    /// Decrements by `n`, stopping at zero.
    pub fn sub(&self, n: u64) {
        let _ = self
            .0
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| Some(v.saturating_sub(n)));
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Histogram of filter pass durations.
#[derive(Debug)]
pub struct Histogram {
    /// Buckets in microseconds: 10, 50, 100, 250, 500, 1ms, 5ms, 10ms, 50ms, 100ms, 1s
    buckets: [AtomicU64; 11],
    sum: AtomicU64,
    count: AtomicU64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    const BUCKET_BOUNDS: [u64; 11] = [
        10, 50, 100, 250, 500, 1_000, 5_000, 10_000, 50_000, 100_000, 1_000_000,
    ];

    pub fn new() -> Self {
        Self {
            buckets: Default::default(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Records a value in microseconds.
    pub fn observe(&self, us: u64) {
        self.sum.fetch_add(us, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        for (i, &bound) in Self::BUCKET_BOUNDS.iter().enumerate() {
            if us <= bound {
                self.buckets[i].fetch_add(1, Ordering::Relaxed);
                return;
            }
        }
        // Value exceeds all buckets, add to last
        self.buckets[10].fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    pub fn mean(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            0.0
        } else {
            self.sum() as f64 / count as f64
        }
    }

    /// Returns bucket counts.
    pub fn buckets(&self) -> Vec<(u64, u64)> {
        Self::BUCKET_BOUNDS
            .iter()
            .zip(self.buckets.iter())
            .map(|(&bound, count)| (bound, count.load(Ordering::Relaxed)))
            .collect()
    }
}

/// Collected limiter metrics.
#[derive(Debug, Default)]
pub struct Metrics {
    // Decisions
    pub metrics_checked: Counter,
    pub metrics_admitted: Counter,
    pub metrics_rejected: Counter,
    pub metric_names_dropped: Counter,

    // Registry
    pub registry_resets: Counter,
    pub estimators_created: Counter,
    pub tracked_metric_names: Gauge,

    // Forwarding
    pub batches_forwarded: Counter,
    pub events_forwarded: Counter,
    pub filter_latency_us: Histogram,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A snapshot of limiter metrics at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimiterSnapshot {
    pub timestamp: DateTime<Utc>,
    pub metrics_checked: u64,
    pub metrics_admitted: u64,
    pub metrics_rejected: u64,
    pub metric_names_dropped: u64,
    pub registry_resets: u64,
    pub estimators_created: u64,
    pub tracked_metric_names: u64,
    pub batches_forwarded: u64,
    pub events_forwarded: u64,
    pub filter_latency_mean_us: f64,
    /// (upper bound in microseconds, count) per bucket
    pub filter_latency_buckets: Vec<(u64, u64)>,
}

impl Metrics {
    /// Takes a snapshot of current metrics.
    pub fn snapshot(&self) -> LimiterSnapshot {
        LimiterSnapshot {
            timestamp: Utc::now(),
            metrics_checked: self.metrics_checked.get(),
            metrics_admitted: self.metrics_admitted.get(),
            metrics_rejected: self.metrics_rejected.get(),
            metric_names_dropped: self.metric_names_dropped.get(),
            registry_resets: self.registry_resets.get(),
            estimators_created: self.estimators_created.get(),
            tracked_metric_names: self.tracked_metric_names.get(),
            batches_forwarded: self.batches_forwarded.get(),
            events_forwarded: self.events_forwarded.get(),
            filter_latency_mean_us: self.filter_latency_us.mean(),
            filter_latency_buckets: self.filter_latency_us.buckets(),
        }
    }
}

impl LimiterSnapshot {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Global metrics registry.
pub static METRICS: std::sync::LazyLock<Metrics> = std::sync::LazyLock::new(Metrics::new);

/// Get the global metrics instance.
pub fn metrics() -> &'static Metrics {
    &METRICS
}
