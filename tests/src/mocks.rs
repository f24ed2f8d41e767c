//! Mock implementations for testing.

use async_trait::async_trait;
use guard_core::error::BackendErrorCode;
use guard_core::{
    wait_for_shutdown, Backend, Error, Event, MetricMap, Result, Runner, SendCallback, Shutdown,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Mock backend that captures batches and events in memory.
///
/// Also acts as a `Runner`, so tests can check that wrappers forward the
/// background task.
#[derive(Clone)]
pub struct MockBackend {
    name: String,
    /// All batches forwarded to this backend.
    batches: Arc<Mutex<Vec<MetricMap>>>,
    /// All events forwarded to this backend.
    events: Arc<Mutex<Vec<Event>>>,
    /// Simulate failures if set.
    should_fail: Arc<Mutex<bool>>,
    /// Completed `run` calls.
    runs: Arc<AtomicUsize>,
}

impl MockBackend {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            batches: Arc::new(Mutex::new(Vec::new())),
            events: Arc::new(Mutex::new(Vec::new())),
            should_fail: Arc::new(Mutex::new(false)),
            runs: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Get all captured batches.
    pub fn captured_batches(&self) -> Vec<MetricMap> {
        self.batches.lock().clone()
    }

    /// The most recently captured batch.
    pub fn last_batch(&self) -> Option<MetricMap> {
        self.batches.lock().last().cloned()
    }

    pub fn batch_count(&self) -> usize {
        self.batches.lock().len()
    }

    pub fn captured_events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn run_count(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    /// Clear captured batches and events.
    pub fn clear(&self) {
        self.batches.lock().clear();
        self.events.lock().clear();
    }

    /// Set failure mode for testing error handling.
    pub fn set_should_fail(&self, fail: bool) {
        *self.should_fail.lock() = fail;
    }

    fn failure(&self) -> Error {
        Error::backend(BackendErrorCode::SendFailed, &self.name, "mock backend failure")
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new("mock")
    }
}

#[async_trait]
impl Backend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn send_metrics_async(&self, batch: MetricMap, callback: SendCallback) {
        if *self.should_fail.lock() {
            callback(vec![self.failure()]);
            return;
        }

        self.batches.lock().push(batch);
        callback(Vec::new());
    }

    async fn send_event(&self, event: &Event) -> Result<()> {
        if *self.should_fail.lock() {
            return Err(self.failure());
        }

        self.events.lock().push(event.clone());
        Ok(())
    }

    fn as_runner(&self) -> Option<&dyn Runner> {
        Some(self)
    }
}

#[async_trait]
impl Runner for MockBackend {
    async fn run(&self, mut shutdown: Shutdown) {
        wait_for_shutdown(&mut shutdown).await;
        self.runs.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_backend_captures_batches() {
        let mock = MockBackend::new("capture");
        let mut batch = MetricMap::new();
        batch.add_counter("requests", 1, crate::fixtures::tags(&["env:test"]));

        mock.send_metrics_async(batch.clone(), Box::new(|_| {}));
        assert_eq!(mock.batch_count(), 1);
        assert_eq!(mock.last_batch(), Some(batch));
    }

    #[tokio::test]
    async fn test_mock_backend_failure_mode() {
        let mock = MockBackend::default();
        mock.set_should_fail(true);

        let result = mock.send_event(&Event::new("deploy", "v1")).await;
        assert!(result.is_err());
        assert!(mock.captured_events().is_empty());
    }
}
