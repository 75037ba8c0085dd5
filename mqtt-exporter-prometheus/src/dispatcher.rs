//! Message dispatch from bus topics to registry updates.

use std::collections::HashMap;

use mqtt_exporter_common::{MessageKind, parse_topic};
use tracing::{debug, trace, warn};

use crate::config::{DecoderConfig, ExporterConfig, FilterConfig};
use crate::decoder::Decoder;
use crate::metrics::{LabelSet, MetricName, sanitize_label_name};
use crate::registry::SharedRegistry;
use crate::translator::translate;

/// Label carrying the message type tag on the message counter.
pub const TYPE_LABEL: &str = "type";

/// Counter label value shared by all unrecognized type tags.
pub const UNKNOWN_TYPE: &str = "unknown";

/// Result of dispatching one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The message was decoded and this many gauges were written.
    Applied(usize),
    /// The message type is known but carries no metric.
    Ignored,
    /// The message type is not recognized.
    Unknown,
    /// The topic is malformed or the device is filtered out.
    Rejected,
}

/// Filter on the device segment of topics.
pub struct DeviceFilter {
    include: Vec<glob::Pattern>,
    exclude: Vec<glob::Pattern>,
}

impl DeviceFilter {
    /// Create a new filter from configuration. Invalid patterns are skipped.
    pub fn new(config: &FilterConfig) -> Self {
        let compile = |patterns: &[String]| -> Vec<glob::Pattern> {
            patterns
                .iter()
                .filter_map(|p| match glob::Pattern::new(p) {
                    Ok(pattern) => Some(pattern),
                    Err(e) => {
                        warn!(pattern = %p, error = %e, "Skipping invalid device pattern");
                        None
                    }
                })
                .collect()
        };

        Self {
            include: compile(&config.include_devices),
            exclude: compile(&config.exclude_devices),
        }
    }

    /// Check if messages from a device should be processed.
    pub fn should_include(&self, device: &str) -> bool {
        if !self.include.is_empty() && !self.include.iter().any(|p| p.matches(device)) {
            return false;
        }
        !self.exclude.iter().any(|p| p.matches(device))
    }
}

impl Default for DeviceFilter {
    fn default() -> Self {
        Self::new(&FilterConfig::default())
    }
}

/// Callback target for inbound bus messages.
///
/// `handle` takes `&self` and may be called from any number of threads.
pub struct Dispatcher {
    registry: SharedRegistry,
    decoder: Decoder,
    filter: DeviceFilter,
    label_name: String,
    default_labels: Vec<(String, String)>,
}

impl Dispatcher {
    /// Create a dispatcher writing into `registry`.
    pub fn new(
        registry: SharedRegistry,
        decoder_config: &DecoderConfig,
        filter_config: &FilterConfig,
        default_labels: &HashMap<String, String>,
    ) -> Self {
        let default_labels = default_labels
            .iter()
            .map(|(k, v)| (sanitize_label_name(k), v.clone()))
            .collect();

        Self {
            registry,
            decoder: Decoder::new(decoder_config.sensor_key.clone()),
            filter: DeviceFilter::new(filter_config),
            label_name: decoder_config.label_name.clone(),
            default_labels,
        }
    }

    /// Create a dispatcher from the full exporter configuration.
    pub fn from_config(registry: SharedRegistry, config: &ExporterConfig) -> Self {
        Self::new(
            registry,
            &config.decoder,
            &config.filters,
            &config.prometheus.default_labels,
        )
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    /// Label set of a device's rows.
    fn device_labels(&self, device: &str) -> LabelSet {
        let mut labels = LabelSet::single(self.label_name.as_str(), device);
        for (key, value) in &self.default_labels {
            labels.insert_if_absent(key.as_str(), value.as_str());
        }
        labels
    }

    /// Process one inbound message.
    ///
    /// Decoding, translation and all registry writes of the message happen
    /// inside a single exclusive registry update.
    pub fn handle(&self, topic: &str, payload: &[u8]) -> DispatchOutcome {
        let Some(parsed) = parse_topic(topic) else {
            warn!(topic = %topic, "Ignoring message on malformed topic");
            return DispatchOutcome::Rejected;
        };

        if !self.filter.should_include(parsed.device) {
            trace!(device = %parsed.device, "Device filtered out");
            return DispatchOutcome::Rejected;
        }

        if parsed.kind == MessageKind::Unknown {
            warn!(topic = %topic, "Invalid topic: ends with unknown message type");
        }

        let labels = self.device_labels(parsed.device);
        let type_labels = match parsed.kind {
            MessageKind::Unknown => LabelSet::single(TYPE_LABEL, UNKNOWN_TYPE),
            _ => LabelSet::single(TYPE_LABEL, parsed.tag),
        };

        let outcome = self.registry.update(|writer| {
            writer.increment_counter(MetricName::MessagesReceived, &type_labels);

            let Some(reading) = self.decoder.decode(parsed.kind, payload) else {
                return match parsed.kind {
                    MessageKind::Unknown => DispatchOutcome::Unknown,
                    _ => DispatchOutcome::Ignored,
                };
            };

            DispatchOutcome::Applied(writer.set_gauges(&labels, &translate(&reading)))
        });

        debug!(
            device = %parsed.device,
            tag = %parsed.tag,
            outcome = ?outcome,
            "Dispatched message"
        );

        outcome
    }
}
