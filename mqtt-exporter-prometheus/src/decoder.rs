//! Best-effort payload decoding.
//!
//! Decoding never fails: a missing field, a field of the wrong type, or a
//! payload that is not JSON at all decodes to the field's zero value.
//! Object keys match exactly first, then ignoring ASCII case.

use mqtt_exporter_common::MessageKind;
use serde_json::{Map, Value};
use tracing::trace;

/// Default key of the nested sensor object in `SENSOR` payloads.
pub const DEFAULT_SENSOR_KEY: &str = "SI7021";

/// A decoded device reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    /// Temperature and humidity from one `SENSOR` payload.
    Climate { temperature: f64, humidity: f64 },
    /// Power state encoded as 1.0 (on) or 0.0 (off).
    Power(f64),
}

/// Map a switch state string to a gauge value: exactly "ON" is 1.0,
/// anything else is 0.0.
pub fn on_off_to_float(state: &str) -> f64 {
    if state == "ON" { 1.0 } else { 0.0 }
}

/// Payload decoder for the handled message kinds.
#[derive(Debug, Clone)]
pub struct Decoder {
    sensor_key: String,
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new(DEFAULT_SENSOR_KEY)
    }
}

impl Decoder {
    /// Create a decoder reading sensor values under `sensor_key`.
    pub fn new(sensor_key: impl Into<String>) -> Self {
        Self {
            sensor_key: sensor_key.into(),
        }
    }

    pub fn sensor_key(&self) -> &str {
        &self.sensor_key
    }

    /// Decode a payload. Returns `None` for kinds that carry no metric.
    pub fn decode(&self, kind: MessageKind, payload: &[u8]) -> Option<Reading> {
        match kind {
            MessageKind::Sensor => {
                let message = parse_object(payload);
                let reading = message
                    .as_ref()
                    .and_then(|m| field(m, &self.sensor_key))
                    .and_then(Value::as_object);

                Some(Reading::Climate {
                    temperature: number_field(reading, "Temperature"),
                    humidity: number_field(reading, "Humidity"),
                })
            }
            MessageKind::State => {
                let message = parse_object(payload);
                Some(Reading::Power(on_off_to_float(string_field(
                    message.as_ref(),
                    "POWER1",
                ))))
            }
            MessageKind::Result => {
                let message = parse_object(payload);
                Some(Reading::Power(on_off_to_float(string_field(
                    message.as_ref(),
                    "POWER",
                ))))
            }
            MessageKind::Power1 => {
                let state = String::from_utf8_lossy(payload);
                Some(Reading::Power(on_off_to_float(&state)))
            }
            MessageKind::Ignored | MessageKind::Unknown => None,
        }
    }
}

/// Parse a payload as a JSON object.
fn parse_object(payload: &[u8]) -> Option<Map<String, Value>> {
    match serde_json::from_slice::<Value>(payload) {
        Ok(Value::Object(map)) => Some(map),
        Ok(other) => {
            trace!(payload = %other, "Payload is not a JSON object");
            None
        }
        Err(e) => {
            trace!(error = %e, payload_len = payload.len(), "Payload is not valid JSON");
            None
        }
    }
}

/// Look up a key, falling back to a case-insensitive match.
fn field<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    object.get(key).or_else(|| {
        object
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    })
}

fn number_field(object: Option<&Map<String, Value>>, key: &str) -> f64 {
    object
        .and_then(|o| field(o, key))
        .and_then(Value::as_f64)
        .unwrap_or_default()
}

fn string_field<'a>(object: Option<&'a Map<String, Value>>, key: &str) -> &'a str {
    object
        .and_then(|o| field(o, key))
        .and_then(Value::as_str)
        .unwrap_or_default()
}
