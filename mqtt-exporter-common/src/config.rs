use serde::{Deserialize, Serialize};

/// MQTT broker connection and subscription settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MqttConfig {
    /// Broker address, e.g. "tcp://127.0.0.1:1883".
    #[serde(default = "default_broker")]
    pub broker: String,

    /// Topic filters to subscribe to.
    #[serde(default = "default_topics")]
    pub topics: Vec<String>,

    /// Optional username for broker authentication.
    #[serde(default)]
    pub username: Option<String>,

    /// Optional password for broker authentication.
    #[serde(default)]
    pub password: Option<String>,

    /// Client identifier (a random one is generated when absent).
    #[serde(default)]
    pub client_id: Option<String>,

    /// Subscription QoS level (0, 1 or 2).
    #[serde(default = "default_qos")]
    pub qos: u8,

    /// Keep-alive interval in seconds.
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,
}

fn default_broker() -> String {
    "tcp://127.0.0.1:1883".to_string()
}

fn default_topics() -> Vec<String> {
    vec!["tele/+/+".to_string(), "stat/+/+".to_string()]
}

fn default_qos() -> u8 {
    2
}

fn default_keep_alive() -> u64 {
    30
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker: default_broker(),
            topics: default_topics(),
            username: None,
            password: None,
            client_id: None,
            qos: default_qos(),
            keep_alive_secs: default_keep_alive(),
        }
    }
}

impl MqttConfig {
    /// Replace the topic list with a space-separated list of topic filters.
    pub fn set_topics_from_str(&mut self, topics: &str) {
        self.topics = topics.split_whitespace().map(str::to_string).collect();
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format (default).
    #[default]
    Text,
    /// Structured JSON format.
    Json,
}

/// Common logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format: "text" or "json".
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}
