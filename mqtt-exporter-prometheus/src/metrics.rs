//! Metric names, types and label sets.

use std::fmt;

/// Prometheus metric type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricType {
    Counter,
    Gauge,
}

impl MetricType {
    /// Get the TYPE comment string for Prometheus exposition format.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Counter => "counter",
            MetricType::Gauge => "gauge",
        }
    }
}

/// The fixed set of metrics the exporter knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MetricName {
    /// Build information of this instance (synthetic, always 1).
    BuildInfo,
    /// Whether the MQTT connection is up (synthetic).
    ConnectionStatus,
    /// Messages dispatched per type tag.
    MessagesReceived,
    Temperature,
    Humidity,
    Power,
}

impl MetricName {
    /// Metrics that hold per-device label rows, in exposition order.
    pub const DEVICE_METRICS: [MetricName; 3] = [
        MetricName::Temperature,
        MetricName::Humidity,
        MetricName::Power,
    ];

    /// Metrics stored in the registry, in exposition order.
    pub const STORED: [MetricName; 4] = [
        MetricName::MessagesReceived,
        MetricName::Temperature,
        MetricName::Humidity,
        MetricName::Power,
    ];

    pub fn metric_type(&self) -> MetricType {
        match self {
            MetricName::MessagesReceived => MetricType::Counter,
            _ => MetricType::Gauge,
        }
    }

    pub fn help(&self) -> &'static str {
        match self {
            MetricName::BuildInfo => "Build info of this instance",
            MetricName::ConnectionStatus => "Is the exporter connected to the MQTT broker",
            MetricName::MessagesReceived => "MQTT messages received, by message type",
            MetricName::Temperature => "Temperature",
            MetricName::Humidity => "Humidity",
            MetricName::Power => "Power state (1 = on)",
        }
    }

    /// Full exposed name. Exporter-level metrics carry the configured prefix,
    /// device metrics do not.
    pub fn exposed_name(&self, prefix: &str) -> String {
        let with_prefix = |name: &str| {
            if prefix.is_empty() {
                name.to_string()
            } else {
                format!("{}_{}", prefix, name)
            }
        };

        match self {
            MetricName::BuildInfo => with_prefix("build_info"),
            MetricName::ConnectionStatus => with_prefix("mqtt_connected"),
            MetricName::MessagesReceived => with_prefix("messages_received_total"),
            MetricName::Temperature => "temperature".to_string(),
            MetricName::Humidity => "humidity".to_string(),
            MetricName::Power => "power".to_string(),
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MetricName::BuildInfo => "build_info",
            MetricName::ConnectionStatus => "connection_status",
            MetricName::MessagesReceived => "messages_received",
            MetricName::Temperature => "temperature",
            MetricName::Humidity => "humidity",
            MetricName::Power => "power",
        };
        f.write_str(name)
    }
}

/// Sorted label key-value pairs identifying one row of a metric.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LabelSet(Vec<(String, String)>);

impl LabelSet {
    /// Create an empty label set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a label set with a single pair.
    pub fn single(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new().with(key, value)
    }

    /// Add a label, replacing any existing value for the same key.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Add a label, replacing any existing value for the same key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.binary_search_by(|(k, _)| k.as_str().cmp(&key)) {
            Ok(idx) => self.0[idx].1 = value,
            Err(idx) => self.0.insert(idx, (key, value)),
        }
    }

    /// Add a label only if the key is not present yet.
    pub fn insert_if_absent(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        if let Err(idx) = self.0.binary_search_by(|(k, _)| k.as_str().cmp(&key)) {
            self.0.insert(idx, (key, value.into()));
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .binary_search_by(|(k, _)| k.as_str().cmp(key))
            .ok()
            .map(|idx| self.0[idx].1.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Check whether a name is a valid Prometheus metric name.
///
/// Prometheus metric names must match `[a-zA-Z_:][a-zA-Z0-9_:]*`.
pub fn is_valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' || first == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

/// Sanitize a label name to be Prometheus-compatible.
///
/// Prometheus label names must match `[a-zA-Z_][a-zA-Z0-9_]*`.
/// Labels starting with `__` are reserved for internal use.
pub fn sanitize_label_name(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    let mut last_was_underscore = false;

    for (i, c) in name.chars().enumerate() {
        let valid = if i == 0 {
            c.is_ascii_alphabetic() || c == '_'
        } else {
            c.is_ascii_alphanumeric() || c == '_'
        };

        if valid {
            result.push(c);
            last_was_underscore = c == '_';
        } else if !last_was_underscore {
            result.push('_');
            last_was_underscore = true;
        }
    }

    while result.ends_with('_') {
        result.pop();
    }

    if result.is_empty() {
        return "label".to_string();
    }

    if result.starts_with("__") {
        result.insert(0, 'z');
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exposed_names() {
        assert_eq!(
            MetricName::BuildInfo.exposed_name("mqtt_exporter"),
            "mqtt_exporter_build_info"
        );
        assert_eq!(
            MetricName::ConnectionStatus.exposed_name("mqtt_exporter"),
            "mqtt_exporter_mqtt_connected"
        );
        assert_eq!(
            MetricName::MessagesReceived.exposed_name(""),
            "messages_received_total"
        );
        assert_eq!(MetricName::Temperature.exposed_name("x"), "temperature");
        assert_eq!(MetricName::Humidity.exposed_name("x"), "humidity");
        assert_eq!(MetricName::Power.exposed_name("x"), "power");
    }

    #[test]
    fn test_metric_types() {
        assert_eq!(
            MetricName::MessagesReceived.metric_type(),
            MetricType::Counter
        );
        for name in MetricName::DEVICE_METRICS {
            assert_eq!(name.metric_type(), MetricType::Gauge);
        }
        assert_eq!(MetricType::Gauge.as_str(), "gauge");
        assert_eq!(MetricType::Counter.as_str(), "counter");
    }

    #[test]
    fn test_label_set_is_sorted_and_unique() {
        let labels = LabelSet::single("room", "kitchen")
            .with("env", "home")
            .with("room", "bedroom");

        let pairs: Vec<_> = labels.iter().collect();
        assert_eq!(pairs, vec![("env", "home"), ("room", "bedroom")]);
        assert_eq!(labels.get("room"), Some("bedroom"));
        assert_eq!(labels.get("missing"), None);
    }

    #[test]
    fn test_label_set_insert_order_independent() {
        let a = LabelSet::single("a", "1").with("b", "2");
        let b = LabelSet::single("b", "2").with("a", "1");

        assert_eq!(a, b);
    }

    #[test]
    fn test_label_set_insert_if_absent() {
        let mut labels = LabelSet::single("room", "kitchen");
        labels.insert_if_absent("room", "other");
        labels.insert_if_absent("site", "home");

        assert_eq!(labels.get("room"), Some("kitchen"));
        assert_eq!(labels.get("site"), Some("home"));
        assert_eq!(labels.len(), 2);
    }

    #[test]
    fn test_is_valid_metric_name() {
        assert!(is_valid_metric_name("mqtt_exporter"));
        assert!(is_valid_metric_name("foo:bar"));
        assert!(!is_valid_metric_name(""));
        assert!(!is_valid_metric_name("1abc"));
        assert!(!is_valid_metric_name("with-dash"));
    }

    #[test]
    fn test_sanitize_label_name() {
        assert_eq!(sanitize_label_name("room"), "room");
        assert_eq!(sanitize_label_name("device-id"), "device_id");
        assert_eq!(sanitize_label_name("site.name"), "site_name");
    }

    #[test]
    fn test_sanitize_label_name_reserved() {
        assert_eq!(sanitize_label_name("__meta"), "z__meta");
    }
}
