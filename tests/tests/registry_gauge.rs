//! The tracked-names gauge is shared by every backend's registry.
//!
//! Kept in its own test binary so no other test moves the global gauge
//! while this one reads it.

use cardinality_limiter::EstimatorRegistry;
use telemetry::metrics;

#[test]
fn test_tracked_names_summed_across_registries() {
    let gauge = &metrics().tracked_metric_names;
    let start = gauge.get();

    let stdout = EstimatorRegistry::new();
    let log = EstimatorRegistry::new();
    for name in ["requests", "latency", "errors"] {
        stdout.check(name, b"env:test", 100);
    }
    for name in ["requests", "queue"] {
        log.check(name, b"env:test", 100);
    }
    // Repeat sightings do not create estimators.
    stdout.check("requests", b"env:prod", 100);
    assert_eq!(gauge.get(), start + 5);

    // One backend's reset leaves the other's names counted.
    assert_eq!(stdout.reset(), 3);
    assert_eq!(gauge.get(), start + 2);

    drop(log);
    assert_eq!(gauge.get(), start);
}
