//! Internal telemetry registry.
//!
//! Components receive a [`Registry`] at construction time and register the
//! counters and gauges they need. Two registries never share state, so
//! independent instances (one per test, one per agent) stay isolated.
//!
//! Metric names are `subsystem__name`. Every metric family declares its label
//! names up front; a concrete series is selected with `with_values`.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Kind of a metric family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// Monotonically increasing count
    Counter,
    /// Point-in-time value
    Gauge,
}

struct Family {
    name: String,
    help: String,
    kind: MetricKind,
    label_names: Vec<String>,
    series: DashMap<Vec<String>, Arc<AtomicU64>>,
}

impl Family {
    fn series(&self, values: &[&str]) -> Arc<AtomicU64> {
        debug_assert_eq!(
            values.len(),
            self.label_names.len(),
            "label values do not match label names for {}",
            self.name
        );
        let key: Vec<String> = values.iter().map(|v| (*v).to_string()).collect();
        let entry = self.series.entry(key).or_insert_with(|| Arc::new(AtomicU64::new(0)));
        Arc::clone(entry.value())
    }
}

/// Registry of metric families
#[derive(Clone, Default)]
pub struct Registry {
    families: Arc<DashMap<String, Arc<Family>>>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    fn family(
        &self,
        subsystem: &str,
        name: &str,
        label_names: &[&str],
        help: &str,
        kind: MetricKind,
    ) -> Arc<Family> {
        let full_name = format!("{}__{}", subsystem, name);
        let entry = self.families.entry(full_name.clone()).or_insert_with(|| {
            Arc::new(Family {
                name: full_name,
                help: help.to_string(),
                kind,
                label_names: label_names.iter().map(|l| (*l).to_string()).collect(),
                series: DashMap::new(),
            })
        });
        let family = Arc::clone(entry.value());
        if family.kind != kind || family.label_names.len() != label_names.len() {
            tracing::warn!(
                "Metric {} re-registered with a different shape, keeping the first registration",
                family.name
            );
        }
        family
    }

    /// Register (or fetch) a counter family
    pub fn counter(&self, subsystem: &str, name: &str, label_names: &[&str], help: &str) -> CounterVec {
        CounterVec {
            family: self.family(subsystem, name, label_names, help, MetricKind::Counter),
        }
    }

    /// Register (or fetch) a gauge family
    pub fn gauge(&self, subsystem: &str, name: &str, label_names: &[&str], help: &str) -> GaugeVec {
        GaugeVec {
            family: self.family(subsystem, name, label_names, help, MetricKind::Gauge),
        }
    }

    /// Current value of every series, sorted by name then labels
    pub fn snapshot(&self) -> Vec<MetricSnapshot> {
        let mut out = Vec::new();
        for family in self.families.iter() {
            for series in family.series.iter() {
                let raw = series.value().load(Ordering::Relaxed);
                let value = match family.kind {
                    MetricKind::Counter => raw as f64,
                    MetricKind::Gauge => f64::from_bits(raw),
                };
                out.push(MetricSnapshot {
                    name: family.name.clone(),
                    help: family.help.clone(),
                    kind: family.kind,
                    labels: family
                        .label_names
                        .iter()
                        .cloned()
                        .zip(series.key().iter().cloned())
                        .collect(),
                    value,
                });
            }
        }
        out.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.labels.cmp(&b.labels)));
        out
    }

    /// Value of one series, if it has been touched
    pub fn value(&self, full_name: &str, label_values: &[&str]) -> Option<f64> {
        let family = self.families.get(full_name)?;
        let key: Vec<String> = label_values.iter().map(|v| (*v).to_string()).collect();
        let raw = family.series.get(&key)?.load(Ordering::Relaxed);
        Some(match family.kind {
            MetricKind::Counter => raw as f64,
            MetricKind::Gauge => f64::from_bits(raw),
        })
    }
}

/// One series in a [`Registry::snapshot`]
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSnapshot {
    /// Full metric name (`subsystem__name`)
    pub name: String,
    /// Help text
    pub help: String,
    /// Counter or gauge
    pub kind: MetricKind,
    /// Label name/value pairs
    pub labels: Vec<(String, String)>,
    /// Current value
    pub value: f64,
}

/// Counter family
#[derive(Clone)]
pub struct CounterVec {
    family: Arc<Family>,
}

impl CounterVec {
    /// Resolve the series for the given label values
    pub fn with_values(&self, values: &[&str]) -> Counter {
        Counter {
            value: self.family.series(values),
        }
    }

    /// Increment the series for the given label values
    pub fn inc(&self, values: &[&str]) {
        self.with_values(values).inc();
    }
}

/// A single counter series
#[derive(Clone, Debug)]
pub struct Counter {
    value: Arc<AtomicU64>,
}

impl Counter {
    /// Increment by one
    #[inline]
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment by `n`
    #[inline]
    pub fn add(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    /// Current value
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Gauge family
#[derive(Clone)]
pub struct GaugeVec {
    family: Arc<Family>,
}

impl GaugeVec {
    /// Resolve the series for the given label values
    pub fn with_values(&self, values: &[&str]) -> Gauge {
        Gauge {
            value: self.family.series(values),
        }
    }

    /// Set the series for the given label values
    pub fn set(&self, value: f64, values: &[&str]) {
        self.with_values(values).set(value);
    }
}

/// A single gauge series
#[derive(Clone, Debug)]
pub struct Gauge {
    value: Arc<AtomicU64>,
}

impl Gauge {
    /// Set the value
    #[inline]
    pub fn set(&self, value: f64) {
        self.value.store(value.to_bits(), Ordering::Relaxed);
    }

    /// Current value
    pub fn get(&self) -> f64 {
        f64::from_bits(self.value.load(Ordering::Relaxed))
    }
}
