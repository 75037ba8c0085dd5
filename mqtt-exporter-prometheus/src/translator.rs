//! Mapping from decoded readings to gauge updates.

use crate::decoder::Reading;
use crate::metrics::MetricName;

/// A single gauge write produced by a reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaugeUpdate {
    pub metric: MetricName,
    pub value: f64,
}

impl GaugeUpdate {
    fn new(metric: MetricName, value: f64) -> Self {
        Self { metric, value }
    }
}

/// Translate a reading into the gauge updates it implies.
///
/// All updates of one reading share the same label set and must be applied
/// together.
pub fn translate(reading: &Reading) -> Vec<GaugeUpdate> {
    match *reading {
        Reading::Climate {
            temperature,
            humidity,
        } => vec![
            GaugeUpdate::new(MetricName::Temperature, temperature),
            GaugeUpdate::new(MetricName::Humidity, humidity),
        ],
        Reading::Power(state) => vec![GaugeUpdate::new(MetricName::Power, state)],
    }
}
