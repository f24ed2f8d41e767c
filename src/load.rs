//! Synthetic statsd-style load.
//!
//! Produces batches shaped like real application traffic: many metric names
//! with a few low-cardinality tags, plus a configurable number of names that
//! carry a unique request ID on every update.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use guard_core::{MetricMap, Tags};

/// Load generator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    /// Whether synthetic batches are generated
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Distinct metric names
    #[serde(default = "default_metric_count")]
    pub metric_count: u64,
    /// Distinct values per low-cardinality tag
    #[serde(default = "default_tag_values")]
    pub tag_values: u64,
    /// Counter updates per flush
    #[serde(default = "default_updates_per_flush")]
    pub updates_per_flush: u64,
    /// Metric names that get a unique request ID tag
    #[serde(default = "default_unique_id_metrics")]
    pub unique_id_metrics: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_metric_count() -> u64 {
    1000
}

fn default_tag_values() -> u64 {
    20
}

fn default_updates_per_flush() -> u64 {
    5000
}

fn default_unique_id_metrics() -> u64 {
    3
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            metric_count: default_metric_count(),
            tag_values: default_tag_values(),
            updates_per_flush: default_updates_per_flush(),
            unique_id_metrics: default_unique_id_metrics(),
        }
    }
}

/// Builds one batch per flush.
pub struct LoadGenerator {
    config: LoadConfig,
}

impl LoadGenerator {
    pub fn new(config: LoadConfig) -> Self {
        Self { config }
    }

    pub fn next_batch(&self) -> MetricMap {
        let mut batch = MetricMap::new();
        let metric_count = self.config.metric_count.max(1);

        for _ in 0..self.config.updates_per_flush {
            let metric = pick(metric_count);
            let name = format!("test.metrics.sender.{}", metric);

            let mut tags: Tags = ["some_tag:some_value"].into_iter().collect();
            for tag in 2..=4 {
                tags.push(format!(
                    "some_tag_{}:some_value_{}",
                    tag,
                    pick(self.config.tag_values.max(1))
                ));
            }
            if metric < self.config.unique_id_metrics {
                tags.push(format!("request_id:{}", Uuid::new_v4()));
            }

            batch.add_counter(&name, pick(10_000) as i64, tags);
        }

        batch
    }
}

/// Uniform pick in `0..n`, drawn from a v4 UUID's random bits.
///
/// `uuid` already brings a random source, so synthetic load needs no `rand`.
/// The modulo bias is negligible for load shaping.
fn pick(n: u64) -> u64 {
    (Uuid::new_v4().as_u128() % n as u128) as u64
}
