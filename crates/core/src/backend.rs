//! Backend contract.
//!
//! A backend receives every flushed `MetricMap` and every point event. Some
//! backends also own long-running tasks; those expose them through the
//! optional `Runner` and `MetricsRunner` roles so that wrappers can forward
//! them without knowing the concrete type.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::watch;

use crate::error::{Error, Result};
use crate::event::Event;
use crate::metric::MetricMap;

/// Completion callback for `send_metrics_async`, called with any delivery errors.
pub type SendCallback = Box<dyn FnOnce(Vec<Error>) + Send + 'static>;

/// Shutdown signal for long-running roles. Flips to `true` on shutdown.
pub type Shutdown = watch::Receiver<bool>;

/// Shared handle to a backend.
pub type SharedBackend = Arc<dyn Backend>;

/// A metrics sink.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Stable backend name, used in configuration and logs.
    fn name(&self) -> &str;

    /// Hands a flushed batch to the backend. Must not block on I/O;
    /// delivery outcome is reported through `callback`.
    fn send_metrics_async(&self, batch: MetricMap, callback: SendCallback);

    /// Sends a point event.
    async fn send_event(&self, event: &Event) -> Result<()>;

    /// The backend's background task, if it has one.
    fn as_runner(&self) -> Option<&dyn Runner> {
        None
    }

    /// The backend's internal-metrics reporter, if it has one.
    fn as_metrics_runner(&self) -> Option<&dyn MetricsRunner> {
        None
    }
}

/// Backend with a background task that runs until shutdown.
#[async_trait]
pub trait Runner: Send + Sync {
    async fn run(&self, shutdown: Shutdown);
}

/// Backend that reports its own internal metrics until shutdown.
#[async_trait]
pub trait MetricsRunner: Send + Sync {
    async fn run_metrics(&self, shutdown: Shutdown);
}

/// Optional roles a backend has, captured once at construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub runner: bool,
    pub metrics_runner: bool,
}

impl Capabilities {
    pub fn of(backend: &dyn Backend) -> Self {
        Self {
            runner: backend.as_runner().is_some(),
            metrics_runner: backend.as_metrics_runner().is_some(),
        }
    }
}

/// Waits until the shutdown signal flips or its sender is dropped.
pub async fn wait_for_shutdown(shutdown: &mut Shutdown) {
    while !*shutdown.borrow() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}
