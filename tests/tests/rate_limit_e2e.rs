//! End-to-end tests for the cardinality limiting decorator.
//!
//! Batches flow through `wrap_backend` into a MockBackend that records what
//! was forwarded, so each test sees exactly what a real backend would get.

use std::sync::Arc;
use std::time::Duration;

use cardinality_limiter::{wrap_backend, RateLimitConfig, RateLimitedBackend};
use guard_core::{Backend, Error, Event, MetricMap, SharedBackend};
use integration_tests::fixtures::{self, tags};
use integration_tests::mocks::MockBackend;
use parking_lot::Mutex;
use tokio::sync::watch;

fn send(backend: &dyn Backend, batch: MetricMap) -> Vec<Error> {
    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = errors.clone();
    backend.send_metrics_async(batch, Box::new(move |e: Vec<Error>| sink.lock().extend(e)));
    let taken = std::mem::take(&mut *errors.lock());
    taken
}

fn wrapped(mock: &MockBackend, config: RateLimitConfig) -> SharedBackend {
    wrap_backend(Arc::new(mock.clone()), &config).expect("valid config")
}

/// limit = 3: identities a, b, c pass, d is cut; after a reset a passes again.
#[tokio::test]
async fn test_limit_three_then_reset() {
    let mock = MockBackend::new("influxdb");
    let backend = RateLimitedBackend::new(
        Arc::new(mock.clone()),
        RateLimitConfig::with_limit(3).with_clear_after_secs(1),
    )
    .unwrap();

    for (id, kept) in [("a", true), ("b", true), ("c", true), ("d", false)] {
        // A register collision can leave the estimate one short of the limit.
        let kept = kept || backend.registry().estimate_for("requests") < Some(3);
        let mut batch = MetricMap::new();
        batch.add_counter("requests", 1, tags(&[format!("id:{}", id).as_str()]));
        send(&backend, batch);
        assert_eq!(
            mock.last_batch().unwrap().counters.contains("requests"),
            kept,
            "identity {}",
            id
        );
    }

    tokio::time::sleep(Duration::from_millis(1_100)).await;

    let mut batch = MetricMap::new();
    batch.add_counter("requests", 1, tags(&["id:a"]));
    send(&backend, batch);
    assert!(mock.last_batch().unwrap().counters.contains("requests"));
    assert_eq!(backend.registry().estimate_for("requests"), Some(1));
}

/// A name at its limit is removed whole; other names pass untouched.
#[tokio::test]
async fn test_over_limit_name_removed_from_batch() {
    let mock = MockBackend::new("influxdb");
    let backend =
        RateLimitedBackend::new(Arc::new(mock.clone()), RateLimitConfig::with_limit(3)).unwrap();

    for id in ["id:1", "id:2", "id:3"] {
        let mut warmup = MetricMap::new();
        warmup.add_counter("x", 1, tags(&[id]));
        send(&backend, warmup);
    }
    fixtures::fill_to_limit(backend.registry(), "x", 3);

    let dropped_before = telemetry::metrics().metric_names_dropped.get();
    let rejected_before = telemetry::metrics().metrics_rejected.get();

    let mut batch = fixtures::steady_batch();
    batch.add_counter("x", 1, tags(&["tagset:A"]));
    batch.add_counter("x", 1, tags(&["tagset:B"]));
    let expected = fixtures::steady_batch();
    send(&backend, batch);

    let forwarded = mock.last_batch().unwrap();
    assert!(!forwarded.counters.contains("x"));
    assert_eq!(forwarded, expected);

    // Counters are process-wide; other tests only ever add to them.
    assert!(telemetry::metrics().metric_names_dropped.get() >= dropped_before + 1);
    assert!(telemetry::metrics().metrics_rejected.get() >= rejected_before + 2);
}

/// Unique request IDs blow past the limit within a single flush.
#[tokio::test]
async fn test_unique_id_explosion() {
    let mock = MockBackend::new("influxdb");
    let backend = wrapped(&mock, RateLimitConfig::with_limit(100));

    let mut batch = fixtures::exploding_counters("api.calls", 500);
    batch.add_counter("api.errors", 1, tags(&["env:test"]));
    send(backend.as_ref(), batch);

    let forwarded = mock.last_batch().unwrap();
    assert!(!forwarded.counters.contains("api.calls"));
    assert!(forwarded.counters.contains("api.errors"));
}

/// Below the limit every tag-set is forwarded, flush after flush.
#[tokio::test]
async fn test_steady_traffic_never_dropped() {
    let mock = MockBackend::new("influxdb");
    let backend = wrapped(&mock, RateLimitConfig::with_limit(10));

    for _ in 0..20 {
        send(backend.as_ref(), fixtures::steady_batch());
        assert_eq!(mock.last_batch().unwrap(), fixtures::steady_batch());
    }
    assert_eq!(mock.batch_count(), 20);
}

/// Per metric overrides win over the default in both directions.
#[tokio::test]
async fn test_per_metric_override() {
    let mock = MockBackend::new("influxdb");
    let config = RateLimitConfig::with_limit(10)
        .with_override("noisy", 1)
        .with_override("trusted", 1_000);
    let backend = wrapped(&mock, config);

    let mut batch = MetricMap::new();
    for i in 0..50 {
        let t = tags(&[format!("id:{}", i).as_str()]);
        batch.add_counter("noisy", 1, t.clone());
        batch.add_counter("trusted", 1, t.clone());
        batch.add_counter("default", 1, t);
    }
    send(backend.as_ref(), batch);

    let forwarded = mock.last_batch().unwrap();
    assert!(!forwarded.counters.contains("noisy"));
    assert!(!forwarded.counters.contains("default"));
    assert_eq!(forwarded.counters.len(), 50);
    assert!(forwarded.counters.contains("trusted"));
}

/// With rate limiting disabled the backend is not wrapped at all.
#[tokio::test]
async fn test_disabled_passes_batches_unmodified() {
    let mock = MockBackend::new("influxdb");
    let backend = wrapped(&mock, RateLimitConfig::default());

    let batch = fixtures::exploding_counters("api.calls", 200);
    let expected = batch.clone();
    send(backend.as_ref(), batch);

    assert_eq!(mock.last_batch().unwrap(), expected);
    assert_eq!(backend.name(), "influxdb");
}

/// Backend errors reach the caller unchanged, for metrics and events.
#[tokio::test]
async fn test_backend_errors_pass_through() {
    let mock = MockBackend::new("influxdb");
    let backend = wrapped(&mock, RateLimitConfig::with_limit(10));
    mock.set_should_fail(true);

    let errors = send(backend.as_ref(), fixtures::steady_batch());
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].error_code(), Some("BACKEND_001"));

    let err = backend.send_event(&Event::new("deploy", "v2")).await.unwrap_err();
    assert!(err.to_string().contains("influxdb"));
}

/// Events are never rate limited.
#[tokio::test]
async fn test_events_forwarded() {
    let mock = MockBackend::new("influxdb");
    let backend = wrapped(&mock, RateLimitConfig::with_limit(0));

    for i in 0..5 {
        let event = Event::new("deploy", format!("build {}", i)).with_tags(fixtures::unique_id_tags());
        backend.send_event(&event).await.unwrap();
    }
    assert_eq!(mock.captured_events().len(), 5);
}

/// The wrapped backend's background task is still reachable.
#[tokio::test]
async fn test_runner_forwarded() {
    let mock = MockBackend::new("influxdb");
    let backend = wrapped(&mock, RateLimitConfig::with_limit(10));
    assert!(backend.as_metrics_runner().is_none());

    let (tx, rx) = watch::channel(false);
    let runner = backend.clone();
    let task = tokio::spawn(async move {
        runner.as_runner().expect("runner role").run(rx).await;
    });
    tx.send(true).unwrap();
    task.await.unwrap();

    assert_eq!(mock.run_count(), 1);
}
