//! Prometheus text exposition of registry snapshots.

use std::fmt::Write;

use crate::metrics::{LabelSet, MetricName};
use crate::registry::Snapshot;

/// Content type of the text exposition format.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Encode a snapshot in Prometheus text exposition format.
///
/// Metrics without rows are omitted. `prefix` is applied to exporter-level
/// metric names.
pub fn encode(snapshot: &Snapshot, prefix: &str) -> String {
    let mut output = String::with_capacity(snapshot.len() * 64);
    let mut current: Option<MetricName> = None;

    for sample in snapshot.samples() {
        let name = sample.metric.exposed_name(prefix);

        if current != Some(sample.metric) {
            current = Some(sample.metric);
            writeln!(output, "# HELP {} {}", name, sample.metric.help()).ok();
            writeln!(
                output,
                "# TYPE {} {}",
                name,
                sample.metric.metric_type().as_str()
            )
            .ok();
        }

        writeln!(
            output,
            "{}{} {}",
            name,
            format_labels(&sample.labels),
            format_value(sample.value)
        )
        .ok();
    }

    output
}

/// Escape special characters in label values.
fn escape_label_value(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            '\n' => result.push_str("\\n"),
            _ => result.push(c),
        }
    }
    result
}

/// Format a floating point value for Prometheus.
fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value.is_sign_positive() {
            "+Inf".to_string()
        } else {
            "-Inf".to_string()
        }
    } else if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{}", value)
    }
}

/// Format labels for Prometheus exposition format.
fn format_labels(labels: &LabelSet) -> String {
    if labels.is_empty() {
        return String::new();
    }

    let parts: Vec<String> = labels
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label_value(v)))
        .collect();

    format!("{{{}}}", parts.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ConnectionProbe, MetricRegistry};
    use std::sync::Arc;

    struct Connected(bool);

    impl ConnectionProbe for Connected {
        fn is_connected(&self) -> bool {
            self.0
        }
    }

    fn make_registry(connected: bool) -> MetricRegistry {
        MetricRegistry::new("0.2.0", Arc::new(Connected(connected)), 100)
    }

    #[test]
    fn test_encode_empty_registry() {
        let output = encode(&make_registry(true).snapshot(), "mqtt_exporter");

        assert_eq!(
            output,
            "# HELP mqtt_exporter_build_info Build info of this instance\n\
             # TYPE mqtt_exporter_build_info gauge\n\
             mqtt_exporter_build_info{version=\"0.2.0\"} 1\n\
             # HELP mqtt_exporter_mqtt_connected Is the exporter connected to the MQTT broker\n\
             # TYPE mqtt_exporter_mqtt_connected gauge\n\
             mqtt_exporter_mqtt_connected 1\n"
        );
    }

    #[test]
    fn test_encode_device_metrics() {
        let registry = make_registry(false);
        registry.set_gauge(
            MetricName::Temperature,
            &LabelSet::single("room", "kitchen"),
            20.6,
        );
        registry.set_gauge(
            MetricName::Temperature,
            &LabelSet::single("room", "bedroom"),
            18.0,
        );
        registry.set_gauge(MetricName::Power, &LabelSet::single("room", "kitchen"), 1.0);

        let output = encode(&registry.snapshot(), "mqtt_exporter");

        assert!(output.contains("mqtt_exporter_mqtt_connected 0\n"));
        assert!(output.contains("# TYPE temperature gauge\n"));
        assert!(output.contains("temperature{room=\"bedroom\"} 18\ntemperature{room=\"kitchen\"} 20.6\n"));
        assert!(output.contains("power{room=\"kitchen\"} 1\n"));
        assert!(!output.contains("humidity"));
        assert_eq!(output.matches("# TYPE temperature").count(), 1);
    }

    #[test]
    fn test_encode_counter() {
        let registry = make_registry(true);
        let labels = LabelSet::single("type", "SENSOR");
        registry.increment_counter(MetricName::MessagesReceived, &labels);

        let output = encode(&registry.snapshot(), "mqtt_exporter");

        assert!(output.contains("# TYPE mqtt_exporter_messages_received_total counter\n"));
        assert!(output.contains("mqtt_exporter_messages_received_total{type=\"SENSOR\"} 1\n"));
    }

    #[test]
    fn test_encode_escapes_label_values() {
        let registry = make_registry(true);
        registry.set_gauge(
            MetricName::Humidity,
            &LabelSet::single("room", "a\"b\\c"),
            50.5,
        );

        let output = encode(&registry.snapshot(), "mqtt_exporter");

        assert!(output.contains("humidity{room=\"a\\\"b\\\\c\"} 50.5\n"));
    }

    #[test]
    fn test_escape_label_value() {
        assert_eq!(escape_label_value("simple"), "simple");
        assert_eq!(escape_label_value("with\"quote"), "with\\\"quote");
        assert_eq!(escape_label_value("with\\backslash"), "with\\\\backslash");
        assert_eq!(escape_label_value("with\nnewline"), "with\\nnewline");
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(42.0), "42");
        assert_eq!(format_value(-3.0), "-3");
        assert_eq!(format_value(3.25), "3.25");
        assert_eq!(format_value(f64::NAN), "NaN");
        assert_eq!(format_value(f64::INFINITY), "+Inf");
        assert_eq!(format_value(f64::NEG_INFINITY), "-Inf");
    }

    #[test]
    fn test_format_labels() {
        assert_eq!(format_labels(&LabelSet::new()), "");
        assert_eq!(
            format_labels(&LabelSet::single("b", "2").with("a", "1")),
            "{a=\"1\",b=\"2\"}"
        );
    }
}
