//! Cardinality limiting backend decorator.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use guard_core::{
    Backend, Capabilities, Event, MetricBucket, MetricKind, MetricMap, MetricsRunner, Result,
    Runner, SendCallback, SharedBackend, Shutdown,
};
use telemetry::metrics;

use crate::config::RateLimitConfig;
use crate::registry::EstimatorRegistry;
use crate::reset::ResetScheduler;

/// Wraps `backend` with cardinality limiting when enabled, otherwise returns
/// it untouched.
pub fn wrap_backend(backend: SharedBackend, config: &RateLimitConfig) -> Result<SharedBackend> {
    if !config.enabled {
        debug!(backend = backend.name(), "Rate limit is disabled for backend");
        return Ok(backend);
    }

    Ok(Arc::new(RateLimitedBackend::new(backend, config.clone())?))
}

/// Backend decorator that drops metric names whose tag-set cardinality has
/// reached their limit.
///
/// Dropping is per metric name: once any tag-set of a name is rejected, every
/// tag-set of that name is removed from the batch of that kind.
pub struct RateLimitedBackend {
    backend: SharedBackend,
    capabilities: Capabilities,
    registry: EstimatorRegistry,
    scheduler: ResetScheduler,
    config: RateLimitConfig,
}

impl RateLimitedBackend {
    /// Creates the decorator. Fails on invalid configuration.
    pub fn new(backend: SharedBackend, config: RateLimitConfig) -> Result<Self> {
        config.ensure_valid()?;

        info!(
            backend = backend.name(),
            default_limit = config.default_limit,
            clear_after_secs = config.clear_after_secs,
            metric_overrides = config.limit_by_metric_name.len(),
            limit_sets = config.limit_sets,
            "Rate limit is enabled for backend"
        );

        Ok(Self {
            capabilities: Capabilities::of(backend.as_ref()),
            registry: EstimatorRegistry::with_error_rate(config.sketch_error_rate),
            scheduler: ResetScheduler::new(config.clear_after()),
            backend,
            config,
        })
    }

    pub fn registry(&self) -> &EstimatorRegistry {
        &self.registry
    }

    /// Removes over-limit metric names from `batch`. Returns the number of
    /// (kind, name) entries removed.
    pub fn rate_limit(&self, batch: &mut MetricMap) -> usize {
        let start = Instant::now();

        let counters = self.over_limit(&batch.counters, MetricKind::Counter);
        let gauges = self.over_limit(&batch.gauges, MetricKind::Gauge);
        let timers = self.over_limit(&batch.timers, MetricKind::Timer);
        let sets = if self.config.limit_sets {
            self.over_limit(&batch.sets, MetricKind::Set)
        } else {
            HashSet::new()
        };

        let mut dropped = 0;
        for (kind, names) in [
            (MetricKind::Counter, counters),
            (MetricKind::Gauge, gauges),
            (MetricKind::Timer, timers),
            (MetricKind::Set, sets),
        ] {
            for name in names {
                if batch.delete(kind, &name) {
                    dropped += 1;
                }
            }
        }

        metrics().metric_names_dropped.inc_by(dropped as u64);
        metrics()
            .filter_latency_us
            .observe(start.elapsed().as_micros() as u64);
        dropped
    }

    /// Checks every tag-set in `bucket` and collects the rejected names.
    fn over_limit<V>(&self, bucket: &MetricBucket<V>, kind: MetricKind) -> HashSet<String> {
        let mut over = HashSet::new();

        bucket.each(|name, tags_key, _| {
            let limit = self.config.limit_for(name);
            let admission = self.registry.check(name, tags_key.as_bytes(), limit);
            metrics().metrics_checked.inc();

            if admission.admitted {
                metrics().metrics_admitted.inc();
                return;
            }

            metrics().metrics_rejected.inc();
            if over.insert(name.to_string()) {
                debug!(
                    backend = self.backend.name(),
                    metric = name,
                    kind = %kind,
                    estimate = admission.estimate,
                    limit,
                    "Dropping metric over cardinality limit"
                );
            }
        });

        over
    }
}

#[async_trait]
impl Backend for RateLimitedBackend {
    fn name(&self) -> &str {
        self.backend.name()
    }

    fn send_metrics_async(&self, mut batch: MetricMap, callback: SendCallback) {
        self.scheduler.maybe_reset(&self.registry);
        self.rate_limit(&mut batch);

        metrics().batches_forwarded.inc();
        self.backend.send_metrics_async(batch, callback);
    }

    async fn send_event(&self, event: &Event) -> Result<()> {
        metrics().events_forwarded.inc();
        self.backend.send_event(event).await
    }

    fn as_runner(&self) -> Option<&dyn Runner> {
        if self.capabilities.runner {
            Some(self)
        } else {
            None
        }
    }

    fn as_metrics_runner(&self) -> Option<&dyn MetricsRunner> {
        if self.capabilities.metrics_runner {
            Some(self)
        } else {
            None
        }
    }
}

#[async_trait]
impl Runner for RateLimitedBackend {
    async fn run(&self, shutdown: Shutdown) {
        if let Some(runner) = self.backend.as_runner() {
            runner.run(shutdown).await;
        }
    }
}

#[async_trait]
impl MetricsRunner for RateLimitedBackend {
    async fn run_metrics(&self, shutdown: Shutdown) {
        if let Some(runner) = self.backend.as_metrics_runner() {
            runner.run_metrics(shutdown).await;
        }
    }
}
