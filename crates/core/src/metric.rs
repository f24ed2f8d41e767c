//! In-flight metric batch model.
//!
//! A `MetricMap` is what the aggregator hands to every backend on flush:
//! one bucket per metric kind, each keyed by metric name and then by the
//! canonical tags key of the tag-set.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Kind of a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Counter,
    Gauge,
    Timer,
    Set,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Counter => "counter",
            Self::Gauge => "gauge",
            Self::Timer => "timer",
            Self::Set => "set",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tags attached to a metric, as `key:value` strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tags(Vec<String>);

impl Tags {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, tag: impl Into<String>) {
        self.0.push(tag.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Canonical identity of the tag-set: tags sorted and comma-joined.
    ///
    /// Independent of insertion order, so the same tag-set always yields
    /// the same key.
    pub fn sorted_string(&self) -> String {
        let mut sorted: Vec<&str> = self.iter().collect();
        sorted.sort_unstable();
        sorted.join(",")
    }
}

impl<S: Into<String>> FromIterator<S> for Tags {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Counter value accumulated over a flush interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Counter {
    pub value: i64,
    pub tags: Tags,
}

/// Last-written gauge value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gauge {
    pub value: f64,
    pub tags: Tags,
}

/// Raw timer samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timer {
    pub values: Vec<f64>,
    pub tags: Tags,
}

/// Unique values seen for a set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Set {
    pub values: HashSet<String>,
    pub tags: Tags,
}

/// Metric values grouped by name and then by tags key.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricBucket<V> {
    entries: HashMap<String, HashMap<String, V>>,
}

impl<V> Default for MetricBucket<V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<V> MetricBucket<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a value, replacing any value at the same name and tags key.
    pub fn insert(&mut self, name: impl Into<String>, tags_key: impl Into<String>, value: V) {
        self.entries
            .entry(name.into())
            .or_default()
            .insert(tags_key.into(), value);
    }

    pub fn get(&self, name: &str, tags_key: &str) -> Option<&V> {
        self.entries.get(name)?.get(tags_key)
    }

    pub fn get_mut(&mut self, name: &str, tags_key: &str) -> Option<&mut V> {
        self.entries.get_mut(name)?.get_mut(tags_key)
    }

    /// Calls `f` for every (name, tags key, value) in the bucket.
    pub fn each<'a, F>(&'a self, mut f: F)
    where
        F: FnMut(&'a str, &'a str, &'a V),
    {
        for (name, by_tags) in &self.entries {
            for (tags_key, value) in by_tags {
                f(name, tags_key, value);
            }
        }
    }

    /// Removes every tag-set recorded under `name`.
    pub fn delete(&mut self, name: &str) -> Option<HashMap<String, V>> {
        self.entries.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of (name, tags key) entries.
    pub fn len(&self) -> usize {
        self.entries.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Flattened reference to one metric instance in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricRef<'a> {
    pub name: &'a str,
    pub kind: MetricKind,
    pub tags_key: &'a str,
}

/// All metrics accumulated since the last flush.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricMap {
    pub counters: MetricBucket<Counter>,
    pub gauges: MetricBucket<Gauge>,
    pub timers: MetricBucket<Timer>,
    pub sets: MetricBucket<Set>,
}

impl MetricMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds to the counter at (name, tags).
    pub fn add_counter(&mut self, name: &str, value: i64, tags: Tags) {
        let key = tags.sorted_string();
        match self.counters.get_mut(name, &key) {
            Some(existing) => existing.value += value,
            None => self.counters.insert(name, key, Counter { value, tags }),
        }
    }

    /// Overwrites the gauge at (name, tags).
    pub fn add_gauge(&mut self, name: &str, value: f64, tags: Tags) {
        let key = tags.sorted_string();
        self.gauges.insert(name, key, Gauge { value, tags });
    }

    /// Appends a timer sample at (name, tags).
    pub fn add_timer(&mut self, name: &str, value: f64, tags: Tags) {
        let key = tags.sorted_string();
        match self.timers.get_mut(name, &key) {
            Some(existing) => existing.values.push(value),
            None => self.timers.insert(
                name,
                key,
                Timer {
                    values: vec![value],
                    tags,
                },
            ),
        }
    }

    /// Adds a member to the set at (name, tags).
    pub fn add_set(&mut self, name: &str, value: impl Into<String>, tags: Tags) {
        let key = tags.sorted_string();
        match self.sets.get_mut(name, &key) {
            Some(existing) => {
                existing.values.insert(value.into());
            }
            None => {
                let mut values = HashSet::new();
                values.insert(value.into());
                self.sets.insert(name, key, Set { values, tags });
            }
        }
    }

    /// Every metric instance in the batch, across all kinds.
    pub fn as_metrics(&self) -> Vec<MetricRef<'_>> {
        let mut metrics = Vec::with_capacity(self.len());
        self.counters.each(|name, tags_key, _| {
            metrics.push(MetricRef {
                name,
                kind: MetricKind::Counter,
                tags_key,
            })
        });
        self.gauges.each(|name, tags_key, _| {
            metrics.push(MetricRef {
                name,
                kind: MetricKind::Gauge,
                tags_key,
            })
        });
        self.timers.each(|name, tags_key, _| {
            metrics.push(MetricRef {
                name,
                kind: MetricKind::Timer,
                tags_key,
            })
        });
        self.sets.each(|name, tags_key, _| {
            metrics.push(MetricRef {
                name,
                kind: MetricKind::Set,
                tags_key,
            })
        });
        metrics
    }

    /// Removes every tag-set of `name` from the bucket of the given kind.
    pub fn delete(&mut self, kind: MetricKind, name: &str) -> bool {
        match kind {
            MetricKind::Counter => self.counters.delete(name).is_some(),
            MetricKind::Gauge => self.gauges.delete(name).is_some(),
            MetricKind::Timer => self.timers.delete(name).is_some(),
            MetricKind::Set => self.sets.delete(name).is_some(),
        }
    }

    pub fn len(&self) -> usize {
        self.counters.len() + self.gauges.len() + self.timers.len() + self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
            && self.gauges.is_empty()
            && self.timers.is_empty()
            && self.sets.is_empty()
    }
}
