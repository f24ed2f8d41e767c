//! Test fixtures and batch generators.

use cardinality_limiter::EstimatorRegistry;
use guard_core::{MetricMap, Tags};
use uuid::Uuid;

/// Build tags from `key:value` strings.
pub fn tags(values: &[&str]) -> Tags {
    values.iter().copied().collect()
}

/// Tags carrying a fresh unique ID, the classic cardinality explosion.
pub fn unique_id_tags() -> Tags {
    tags(&["env:test", format!("request_id:{}", Uuid::new_v4()).as_str()])
}

/// Inserts fresh identities until `name` reaches `limit`. A handful of
/// distinct tag-sets may land in one sketch register and count once.
pub fn fill_to_limit(registry: &EstimatorRegistry, name: &str, limit: u64) {
    let mut i = 0;
    while registry.estimate_for(name).unwrap_or(0) < limit {
        registry.check(name, format!("fill:{}", i).as_bytes(), limit);
        i += 1;
    }
}

/// A batch with `n` counters for `name`, each with a distinct tag-set.
pub fn exploding_counters(name: &str, n: usize) -> MetricMap {
    let mut batch = MetricMap::new();
    for _ in 0..n {
        batch.add_counter(name, 1, unique_id_tags());
    }
    batch
}

/// A batch of well-behaved metrics with a handful of fixed tag-sets.
pub fn steady_batch() -> MetricMap {
    let mut batch = MetricMap::new();
    for route in ["/", "/login", "/checkout"] {
        let route_tags = tags(&["env:test", format!("route:{}", route).as_str()]);
        batch.add_counter("http.requests", 1, route_tags.clone());
        batch.add_timer("http.latency", 12.5, route_tags.clone());
        batch.add_gauge("http.inflight", 2.0, route_tags);
    }
    batch.add_set("http.visitors", "alice", tags(&["env:test"]));
    batch
}
