//! Rate limit configuration.

use guard_core::error::ConfigErrorCode;
use guard_core::limits::{DEFAULT_CLEAR_AFTER_SECS, DEFAULT_LIMIT, DEFAULT_SKETCH_ERROR_RATE};
use guard_core::{Error, Result};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use validator::Validate;

/// Cardinality limit configuration, shared by every wrapped backend.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RateLimitConfig {
    /// Whether backends are wrapped at all
    #[serde(default)]
    pub enabled: bool,
    /// Distinct tag-sets allowed per metric name
    #[serde(default = "default_limit")]
    pub default_limit: u64,
    /// Seconds between full registry resets
    #[serde(default = "default_clear_after_secs")]
    #[validate(range(min = 1))]
    pub clear_after_secs: u64,
    /// Per metric name limits, taking precedence over `default_limit`.
    /// Keys are lowercased and matched case-insensitively, since config
    /// sources lowercase map keys on load.
    #[serde(default, deserialize_with = "deserialize_overrides")]
    pub limit_by_metric_name: HashMap<String, u64>,
    /// Whether sets are limited too
    #[serde(default)]
    pub limit_sets: bool,
    /// Error rate requested from each HyperLogLog sketch
    #[serde(default = "default_sketch_error_rate")]
    #[validate(range(min = 0.0041, max = 0.23))]
    pub sketch_error_rate: f64,
}

fn default_limit() -> u64 {
    DEFAULT_LIMIT
}

fn default_clear_after_secs() -> u64 {
    DEFAULT_CLEAR_AFTER_SECS
}

fn default_sketch_error_rate() -> f64 {
    DEFAULT_SKETCH_ERROR_RATE
}

fn deserialize_overrides<'de, D>(deserializer: D) -> std::result::Result<HashMap<String, u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = HashMap::<String, u64>::deserialize(deserializer)?;
    let mut overrides = HashMap::with_capacity(raw.len());
    for (name, limit) in raw {
        if let Some(previous) = overrides.insert(name.to_lowercase(), limit) {
            if previous != limit {
                return Err(D::Error::custom(format!(
                    "conflicting limits for metric name {}: {} and {}",
                    name, previous, limit
                )));
            }
        }
    }
    Ok(overrides)
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            default_limit: default_limit(),
            clear_after_secs: default_clear_after_secs(),
            limit_by_metric_name: HashMap::new(),
            limit_sets: false,
            sketch_error_rate: default_sketch_error_rate(),
        }
    }
}

impl RateLimitConfig {
    /// Enabled configuration with the given default limit.
    pub fn with_limit(limit: u64) -> Self {
        Self {
            enabled: true,
            default_limit: limit,
            ..Self::default()
        }
    }

    pub fn with_override(mut self, metric_name: impl Into<String>, limit: u64) -> Self {
        self.limit_by_metric_name
            .insert(metric_name.into().to_lowercase(), limit);
        self
    }

    pub fn with_clear_after_secs(mut self, secs: u64) -> Self {
        self.clear_after_secs = secs;
        self
    }

    pub fn with_limit_sets(mut self, limit_sets: bool) -> Self {
        self.limit_sets = limit_sets;
        self
    }

    /// Limit that applies to `metric_name`.
    pub fn limit_for(&self, metric_name: &str) -> u64 {
        if self.limit_by_metric_name.is_empty() {
            return self.default_limit;
        }

        let limit = if metric_name.chars().any(char::is_uppercase) {
            self.limit_by_metric_name.get(&metric_name.to_lowercase())
        } else {
            self.limit_by_metric_name.get(metric_name)
        };
        limit.copied().unwrap_or(self.default_limit)
    }

    pub fn clear_after(&self) -> Duration {
        Duration::from_secs(self.clear_after_secs)
    }

    /// Checks value ranges. Failure is fatal at startup.
    pub fn ensure_valid(&self) -> Result<()> {
        self.validate().map_err(|errors| {
            let code = if errors.field_errors().contains_key("clear_after_secs") {
                ConfigErrorCode::InvalidDuration
            } else {
                ConfigErrorCode::InvalidLimit
            };
            Error::config(code, format!("invalid rate limit configuration: {}", errors))
        })?;

        // Mixed-case keys set directly on the field would never match
        if let Some(name) = self
            .limit_by_metric_name
            .keys()
            .find(|name| name.chars().any(char::is_uppercase))
        {
            return Err(Error::config(
                ConfigErrorCode::MalformedOverrides,
                format!("limit override key must be lowercase: {}", name),
            ));
        }

        Ok(())
    }
}
