//! Metric registry holding the latest value per (metric, label set).
//!
//! The registry is the only shared mutable state of the exporter. A single
//! read/write lock guards all families: snapshots take it in shared mode,
//! every [`MetricRegistry::update`] takes it exclusively, so all writes made
//! inside one update become visible to snapshots at once.

use std::collections::BTreeMap;
use std::sync::Arc;

use mqtt_exporter_common::ConnectionState;
use parking_lot::RwLock;
use tracing::warn;

use crate::metrics::{LabelSet, MetricName, MetricType};
use crate::translator::GaugeUpdate;

/// Synchronous view of the bus connection state.
pub trait ConnectionProbe: Send + Sync {
    /// Whether the bus connection is currently up.
    fn is_connected(&self) -> bool;
}

impl ConnectionProbe for ConnectionState {
    fn is_connected(&self) -> bool {
        ConnectionState::is_connected(self)
    }
}

/// One metric row in a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub metric: MetricName,
    pub labels: LabelSet,
    pub value: f64,
}

/// A point-in-time copy of every metric row.
///
/// Samples are grouped by metric in exposition order and sorted by labels
/// within each metric.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    samples: Vec<Sample>,
}

impl Snapshot {
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Value of one row, if present.
    pub fn get(&self, metric: MetricName, labels: &LabelSet) -> Option<f64> {
        self.samples
            .iter()
            .find(|s| s.metric == metric && &s.labels == labels)
            .map(|s| s.value)
    }

    /// All rows of one metric.
    pub fn metric(&self, metric: MetricName) -> impl Iterator<Item = &Sample> {
        self.samples.iter().filter(move |s| s.metric == metric)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[derive(Debug)]
struct RegistryState {
    families: BTreeMap<MetricName, BTreeMap<LabelSet, f64>>,
    /// Stored gauge rows.
    series: usize,
}

impl RegistryState {
    fn new() -> Self {
        let families = MetricName::STORED
            .iter()
            .map(|name| (*name, BTreeMap::new()))
            .collect();

        Self {
            families,
            series: 0,
        }
    }
}

/// Exclusive access to the registry for the duration of one update.
///
/// Only gauge rows count against `max_series`. Counter rows are keyed by a
/// bounded set of message types.
pub struct RegistryWriter<'a> {
    state: &'a mut RegistryState,
    max_series: usize,
}

impl RegistryWriter<'_> {
    /// Whether `new_rows` more gauge rows fit under the series limit.
    pub fn has_capacity(&self, new_rows: usize) -> bool {
        self.state.series + new_rows <= self.max_series
    }

    /// Set a gauge row, creating it if absent. Returns whether the value was stored.
    pub fn set_gauge(&mut self, metric: MetricName, labels: &LabelSet, value: f64) -> bool {
        if metric.metric_type() != MetricType::Gauge {
            warn!(metric = %metric, "Refusing to set a non-gauge metric");
            return false;
        }

        match self.row(metric, labels) {
            Some(row) => {
                *row = value;
                true
            }
            None => false,
        }
    }

    /// Set several gauge rows sharing one label set. Either all updates are
    /// stored or none is. Returns the number of rows written.
    pub fn set_gauges(&mut self, labels: &LabelSet, updates: &[GaugeUpdate]) -> usize {
        let mut new_rows = 0;
        for update in updates {
            if update.metric.metric_type() != MetricType::Gauge {
                warn!(metric = %update.metric, "Refusing to set a non-gauge metric");
                return 0;
            }
            match self.state.families.get(&update.metric) {
                Some(family) if !family.contains_key(labels) => new_rows += 1,
                Some(_) => {}
                None => {
                    warn!(metric = %update.metric, "Metric is not stored in the registry");
                    return 0;
                }
            }
        }

        if !self.has_capacity(new_rows) {
            warn!(
                new_rows,
                max_series = self.max_series,
                "Max series limit reached, dropping message"
            );
            return 0;
        }

        for update in updates {
            if let Some(row) = self.row(update.metric, labels) {
                *row = update.value;
            }
        }
        updates.len()
    }

    /// Increment a counter row by one, creating it at zero if absent.
    pub fn increment_counter(&mut self, metric: MetricName, labels: &LabelSet) -> bool {
        if metric.metric_type() != MetricType::Counter {
            warn!(metric = %metric, "Refusing to increment a non-counter metric");
            return false;
        }

        match self.row(metric, labels) {
            Some(row) => {
                *row += 1.0;
                true
            }
            None => false,
        }
    }

    fn row(&mut self, metric: MetricName, labels: &LabelSet) -> Option<&mut f64> {
        let Some(family) = self.state.families.get_mut(&metric) else {
            warn!(metric = %metric, "Metric is not stored in the registry");
            return None;
        };

        if metric.metric_type() == MetricType::Gauge && !family.contains_key(labels) {
            if self.state.series >= self.max_series {
                warn!(
                    metric = %metric,
                    max_series = self.max_series,
                    "Max series limit reached, dropping new metric row"
                );
                return None;
            }
            self.state.series += 1;
        }

        Some(family.entry(labels.clone()).or_insert(0.0))
    }
}

/// Thread-safe metric registry.
pub struct MetricRegistry {
    state: RwLock<RegistryState>,
    version: String,
    connection: Arc<dyn ConnectionProbe>,
    max_series: usize,
}

impl MetricRegistry {
    /// Create a registry with the fixed metric set registered.
    ///
    /// `version` labels the build info metric; `connection` is queried on
    /// every snapshot.
    pub fn new(
        version: impl Into<String>,
        connection: Arc<dyn ConnectionProbe>,
        max_series: usize,
    ) -> Self {
        Self {
            state: RwLock::new(RegistryState::new()),
            version: version.into(),
            connection,
            max_series,
        }
    }

    /// Run `f` with exclusive access to the registry.
    pub fn update<R>(&self, f: impl FnOnce(&mut RegistryWriter<'_>) -> R) -> R {
        let mut state = self.state.write();
        let mut writer = RegistryWriter {
            state: &mut *state,
            max_series: self.max_series,
        };
        f(&mut writer)
    }

    /// Set a single gauge row.
    pub fn set_gauge(&self, metric: MetricName, labels: &LabelSet, value: f64) -> bool {
        self.update(|w| w.set_gauge(metric, labels, value))
    }

    /// Increment a single counter row.
    pub fn increment_counter(&self, metric: MetricName, labels: &LabelSet) -> bool {
        self.update(|w| w.increment_counter(metric, labels))
    }

    /// Take a consistent snapshot of all metrics, including the synthetic
    /// build info and connection status rows.
    pub fn snapshot(&self) -> Snapshot {
        let state = self.state.read();

        let mut samples = Vec::with_capacity(state.series + 2);
        samples.push(Sample {
            metric: MetricName::BuildInfo,
            labels: LabelSet::single("version", self.version.as_str()),
            value: 1.0,
        });
        samples.push(Sample {
            metric: MetricName::ConnectionStatus,
            labels: LabelSet::new(),
            value: if self.connection.is_connected() {
                1.0
            } else {
                0.0
            },
        });

        for (metric, rows) in &state.families {
            for (labels, value) in rows {
                samples.push(Sample {
                    metric: *metric,
                    labels: labels.clone(),
                    value: *value,
                });
            }
        }

        Snapshot { samples }
    }

    /// Current value of one row.
    pub fn value(&self, metric: MetricName, labels: &LabelSet) -> Option<f64> {
        self.state
            .read()
            .families
            .get(&metric)
            .and_then(|rows| rows.get(labels))
            .copied()
    }

    /// Number of stored gauge rows, the rows counted against `max_series`.
    pub fn series_count(&self) -> usize {
        self.state.read().series
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }
}

/// Create a shareable registry handle.
pub type SharedRegistry = Arc<MetricRegistry>;
