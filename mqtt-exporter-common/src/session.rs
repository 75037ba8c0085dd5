use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rand::Rng;
use rand::distr::Alphanumeric;
use rumqttc::{MqttOptions, QoS};

use crate::config::MqttConfig;
use crate::error::{Error, Result};

/// Prefix for generated client identifiers.
pub const CLIENT_ID_PREFIX: &str = "mqtt-exporter-";

fn random_client_id() -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(12)
        .map(char::from)
        .collect();
    format!("{}{}", CLIENT_ID_PREFIX, suffix)
}

/// Normalize a broker address into a URL rumqttc understands.
///
/// Bare `host:port` addresses are treated as plain TCP.
fn broker_url(broker: &str) -> String {
    if broker.contains("://") {
        broker.to_string()
    } else {
        format!("tcp://{}", broker)
    }
}

/// Build client options from the configuration.
pub fn mqtt_options(config: &MqttConfig) -> Result<MqttOptions> {
    let mut parsed_url = url::Url::parse(&broker_url(&config.broker))
        .map_err(|e| Error::Config(format!("Invalid broker address '{}': {}", config.broker, e)))?;

    // rumqttc reads the client id from the URL query, it cannot be changed afterwards.
    let has_client_id = parsed_url.query_pairs().any(|(key, _)| key == "client_id");
    if has_client_id && config.client_id.is_some() {
        return Err(Error::Config(
            "client_id is set both in the broker address and in the configuration".to_string(),
        ));
    }
    if !has_client_id {
        let client_id = config.client_id.clone().unwrap_or_else(random_client_id);
        parsed_url
            .query_pairs_mut()
            .append_pair("client_id", &client_id);
    }

    let mut options = MqttOptions::parse_url(parsed_url.as_str())
        .map_err(|e| Error::Config(format!("Invalid broker address '{}': {}", config.broker, e)))?;

    options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));
    options.set_clean_session(true);

    match (&config.username, &config.password) {
        (Some(username), password) => {
            options.set_credentials(username.clone(), password.clone().unwrap_or_default());
        }
        (None, Some(_)) => {
            return Err(Error::Config(
                "A password was configured without a username".to_string(),
            ));
        }
        (None, None) => {}
    }

    tracing::debug!(
        broker = %config.broker,
        client_id = %options.client_id(),
        keep_alive_secs = config.keep_alive_secs,
        "Built MQTT client options"
    );

    Ok(options)
}

/// Convert a numeric QoS level.
pub fn qos_from_level(level: u8) -> Result<QoS> {
    match level {
        0 => Ok(QoS::AtMostOnce),
        1 => Ok(QoS::AtLeastOnce),
        2 => Ok(QoS::ExactlyOnce),
        other => Err(Error::Config(format!(
            "Invalid QoS level: {}. Expected 0, 1 or 2",
            other
        ))),
    }
}

/// Live connection state of the MQTT client, shared between the event loop
/// and the scrape path.
#[derive(Debug, Clone, Default)]
pub struct ConnectionState {
    connected: Arc<AtomicBool>,
}

impl ConnectionState {
    /// Create a new state, initially disconnected.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the client currently holds an acknowledged connection.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Record a connection state change. Returns the previous state.
    pub fn set_connected(&self, connected: bool) -> bool {
        self.connected.swap(connected, Ordering::AcqRel)
    }
}
