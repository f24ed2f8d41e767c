//! Backend that writes flushed batches to the log.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info};

use guard_core::{
    wait_for_shutdown, Backend, Event, MetricMap, MetricsRunner, Result, SendCallback, Shutdown,
};

/// Logs a summary of every batch and event it receives.
pub struct LogBackend {
    name: String,
    report_interval: Duration,
    batches: AtomicU64,
    metrics: AtomicU64,
    events: AtomicU64,
}

impl LogBackend {
    pub fn new(name: impl Into<String>, report_interval: Duration) -> Self {
        Self {
            name: name.into(),
            report_interval,
            batches: AtomicU64::new(0),
            metrics: AtomicU64::new(0),
            events: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl Backend for LogBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn send_metrics_async(&self, batch: MetricMap, callback: SendCallback) {
        self.batches.fetch_add(1, Ordering::Relaxed);
        self.metrics.fetch_add(batch.len() as u64, Ordering::Relaxed);

        debug!(
            backend = %self.name,
            counters = batch.counters.len(),
            gauges = batch.gauges.len(),
            timers = batch.timers.len(),
            sets = batch.sets.len(),
            "Received batch"
        );
        callback(Vec::new());
    }

    async fn send_event(&self, event: &Event) -> Result<()> {
        self.events.fetch_add(1, Ordering::Relaxed);
        info!(backend = %self.name, event = %event.to_json()?, "Received event");
        Ok(())
    }

    fn as_metrics_runner(&self) -> Option<&dyn MetricsRunner> {
        Some(self)
    }
}

#[async_trait]
impl MetricsRunner for LogBackend {
    async fn run_metrics(&self, mut shutdown: Shutdown) {
        let mut ticker = tokio::time::interval(self.report_interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    info!(
                        backend = %self.name,
                        batches = self.batches.load(Ordering::Relaxed),
                        metrics = self.metrics.load(Ordering::Relaxed),
                        events = self.events.load(Ordering::Relaxed),
                        "Backend totals"
                    );
                }
                _ = wait_for_shutdown(&mut shutdown) => break,
            }
        }
    }
}
