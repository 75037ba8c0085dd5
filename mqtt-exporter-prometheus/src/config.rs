//! Configuration for the Prometheus exporter.

use mqtt_exporter_common::{LoggingConfig, MqttConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

use crate::decoder::DEFAULT_SENSOR_KEY;
use crate::metrics::{is_valid_metric_name, sanitize_label_name};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] json5::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Complete exporter configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// MQTT broker settings.
    #[serde(default)]
    pub mqtt: MqttConfig,

    /// Prometheus exporter settings.
    #[serde(default)]
    pub prometheus: PrometheusConfig,

    /// Payload decoding settings.
    #[serde(default)]
    pub decoder: DecoderConfig,

    /// Memory protection limits.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Device filtering settings.
    #[serde(default)]
    pub filters: FilterConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Prometheus HTTP endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrometheusConfig {
    /// Address to listen on (default: "0.0.0.0:9337").
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Path for metrics endpoint (default: "/metrics").
    #[serde(default = "default_path")]
    pub path: String,

    /// Labels added to every device metric.
    #[serde(default)]
    pub default_labels: HashMap<String, String>,

    /// Name prefix of the exporter's own metrics (default: "mqtt_exporter").
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

fn default_listen() -> String {
    "0.0.0.0:9337".to_string()
}

fn default_path() -> String {
    "/metrics".to_string()
}

fn default_prefix() -> String {
    "mqtt_exporter".to_string()
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            path: default_path(),
            default_labels: HashMap::new(),
            prefix: default_prefix(),
        }
    }
}

/// Payload decoding configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecoderConfig {
    /// Key of the nested sensor object in SENSOR payloads.
    #[serde(default = "default_sensor_key")]
    pub sensor_key: String,

    /// Label name carrying the device segment of the topic.
    #[serde(default = "default_label_name")]
    pub label_name: String,
}

fn default_sensor_key() -> String {
    DEFAULT_SENSOR_KEY.to_string()
}

fn default_label_name() -> String {
    "room".to_string()
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            sensor_key: default_sensor_key(),
            label_name: default_label_name(),
        }
    }
}

/// Memory protection limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum stored label rows across all metrics.
    #[serde(default = "default_max_series")]
    pub max_series: usize,
}

fn default_max_series() -> usize {
    10_000
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_series: default_max_series(),
        }
    }
}

/// Device filtering configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Glob patterns for devices to include (empty = all).
    #[serde(default)]
    pub include_devices: Vec<String>,

    /// Glob patterns for devices to exclude.
    #[serde(default)]
    pub exclude_devices: Vec<String>,
}

impl ExporterConfig {
    /// Load configuration from a JSON5 file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a JSON5 string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: ExporterConfig = json5::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mqtt.broker.trim().is_empty() {
            return Err(ConfigError::Validation(
                "MQTT broker address must not be empty".to_string(),
            ));
        }

        if self.mqtt.topics.iter().all(|t| t.trim().is_empty()) {
            return Err(ConfigError::Validation(
                "At least one MQTT topic is required".to_string(),
            ));
        }

        if self.mqtt.qos > 2 {
            return Err(ConfigError::Validation(format!(
                "Invalid QoS level: {}",
                self.mqtt.qos
            )));
        }

        if self.mqtt.keep_alive_secs < 5 {
            return Err(ConfigError::Validation(
                "keep_alive_secs must be >= 5".to_string(),
            ));
        }

        if self.limits.max_series == 0 {
            return Err(ConfigError::Validation(
                "max_series must be > 0".to_string(),
            ));
        }

        // Validate listen address format
        if self
            .prometheus
            .listen
            .parse::<std::net::SocketAddr>()
            .is_err()
        {
            return Err(ConfigError::Validation(format!(
                "Invalid listen address: {}",
                self.prometheus.listen
            )));
        }

        // Validate path starts with /
        if !self.prometheus.path.starts_with('/') {
            return Err(ConfigError::Validation(
                "Metrics path must start with /".to_string(),
            ));
        }

        if !self.prometheus.prefix.is_empty() && !is_valid_metric_name(&self.prometheus.prefix) {
            return Err(ConfigError::Validation(format!(
                "Invalid metric prefix: {}",
                self.prometheus.prefix
            )));
        }

        if self.decoder.sensor_key.is_empty() {
            return Err(ConfigError::Validation(
                "sensor_key must not be empty".to_string(),
            ));
        }

        if sanitize_label_name(&self.decoder.label_name) != self.decoder.label_name {
            return Err(ConfigError::Validation(format!(
                "Invalid label name: {}",
                self.decoder.label_name
            )));
        }

        let mut default_label_keys: HashMap<String, &str> = HashMap::new();
        for key in self.prometheus.default_labels.keys() {
            let sanitized = sanitize_label_name(key);
            if let Some(other) = default_label_keys.insert(sanitized.clone(), key) {
                return Err(ConfigError::Validation(format!(
                    "Default labels '{}' and '{}' both map to label '{}'",
                    other, key, sanitized
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mqtt_exporter_common::LogFormat;
    use std::io::Write;

    #[test]
    fn test_parse_minimal_config() {
        let config = ExporterConfig::parse("{}").unwrap();

        assert_eq!(config.mqtt.broker, "tcp://127.0.0.1:1883");
        assert_eq!(config.mqtt.topics, vec!["tele/+/+", "stat/+/+"]);
        assert_eq!(config.prometheus.listen, "0.0.0.0:9337");
        assert_eq!(config.prometheus.path, "/metrics");
        assert_eq!(config.prometheus.prefix, "mqtt_exporter");
        assert_eq!(config.decoder.sensor_key, "SI7021");
        assert_eq!(config.decoder.label_name, "room");
        assert_eq!(config.limits.max_series, 10_000);
        assert!(config.filters.include_devices.is_empty());
    }

    #[test]
    fn test_parse_full_config() {
        let json = r#"{
            mqtt: {
                broker: "tcp://broker.local:1883",
                topics: ["tele/+/SENSOR", "stat/+/POWER1"],
                username: "exporter",
                password: "secret",
                client_id: "exporter-1",
                qos: 1,
                keep_alive_secs: 60
            },
            prometheus: {
                listen: "127.0.0.1:9338",
                path: "/prometheus/metrics",
                prefix: "home",
                default_labels: {
                    site: "house"
                }
            },
            decoder: {
                sensor_key: "AM2301",
                label_name: "device"
            },
            limits: {
                max_series: 500
            },
            filters: {
                include_devices: ["living*"],
                exclude_devices: ["test-*"]
            },
            logging: {
                level: "debug",
                format: "json"
            }
        }"#;

        let config = ExporterConfig::parse(json).unwrap();

        assert_eq!(config.mqtt.broker, "tcp://broker.local:1883");
        assert_eq!(config.mqtt.topics, vec!["tele/+/SENSOR", "stat/+/POWER1"]);
        assert_eq!(config.mqtt.username.as_deref(), Some("exporter"));
        assert_eq!(config.mqtt.client_id.as_deref(), Some("exporter-1"));
        assert_eq!(config.mqtt.qos, 1);
        assert_eq!(config.mqtt.keep_alive_secs, 60);
        assert_eq!(config.prometheus.listen, "127.0.0.1:9338");
        assert_eq!(config.prometheus.path, "/prometheus/metrics");
        assert_eq!(config.prometheus.prefix, "home");
        assert_eq!(
            config.prometheus.default_labels.get("site"),
            Some(&"house".to_string())
        );
        assert_eq!(config.decoder.sensor_key, "AM2301");
        assert_eq!(config.decoder.label_name, "device");
        assert_eq!(config.limits.max_series, 500);
        assert_eq!(config.filters.include_devices, vec!["living*"]);
        assert_eq!(config.filters.exclude_devices, vec!["test-*"]);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{{ mqtt: {{ broker: \"tcp://10.0.0.2:1883\" }} }}").unwrap();

        let config = ExporterConfig::load_from_file(file.path()).unwrap();

        assert_eq!(config.mqtt.broker, "tcp://10.0.0.2:1883");
    }

    #[test]
    fn test_load_missing_file() {
        let result = ExporterConfig::load_from_file("/nonexistent/exporter.json5");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_parse_error() {
        let result = ExporterConfig::parse("{ mqtt: ");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_validate_invalid_listen() {
        let json = r#"{
            prometheus: { listen: "not-an-address" }
        }"#;

        let result = ExporterConfig::parse(json);
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Invalid listen address")
        );
    }

    #[test]
    fn test_validate_invalid_path() {
        let json = r#"{
            prometheus: { path: "no-leading-slash" }
        }"#;

        let result = ExporterConfig::parse(json);
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("must start with /")
        );
    }

    #[test]
    fn test_validate_empty_topics() {
        assert!(ExporterConfig::parse(r#"{ mqtt: { topics: [] } }"#).is_err());
        assert!(ExporterConfig::parse(r#"{ mqtt: { topics: [" "] } }"#).is_err());
    }

    #[test]
    fn test_validate_empty_broker() {
        assert!(ExporterConfig::parse(r#"{ mqtt: { broker: "" } }"#).is_err());
    }

    #[test]
    fn test_validate_invalid_qos() {
        assert!(ExporterConfig::parse(r#"{ mqtt: { qos: 3 } }"#).is_err());
    }

    #[test]
    fn test_validate_short_keep_alive() {
        assert!(ExporterConfig::parse(r#"{ mqtt: { keep_alive_secs: 1 } }"#).is_err());
    }

    #[test]
    fn test_validate_zero_max_series() {
        assert!(ExporterConfig::parse(r#"{ limits: { max_series: 0 } }"#).is_err());
    }

    #[test]
    fn test_validate_invalid_prefix() {
        assert!(ExporterConfig::parse(r#"{ prometheus: { prefix: "my-app" } }"#).is_err());
        assert!(ExporterConfig::parse(r#"{ prometheus: { prefix: "" } }"#).is_ok());
    }

    #[test]
    fn test_validate_invalid_label_name() {
        assert!(ExporterConfig::parse(r#"{ decoder: { label_name: "room name" } }"#).is_err());
        assert!(ExporterConfig::parse(r#"{ decoder: { sensor_key: "" } }"#).is_err());
    }

    #[test]
    fn test_validate_colliding_default_labels() {
        let mut config = ExporterConfig::default();
        config
            .prometheus
            .default_labels
            .insert("site.name".to_string(), "a".to_string());
        config
            .prometheus
            .default_labels
            .insert("site-name".to_string(), "b".to_string());

        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_validate_distinct_default_labels() {
        let mut config = ExporterConfig::default();
        config
            .prometheus
            .default_labels
            .insert("site".to_string(), "home".to_string());
        config
            .prometheus
            .default_labels
            .insert("env".to_string(), "prod".to_string());

        assert!(config.validate().is_ok());
    }
}
