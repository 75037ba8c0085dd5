//! Topic parsing and message classification.
//!
//! Device topics follow the pattern `<prefix>/<device>/<TYPE>`, for example
//! `tele/kitchen/SENSOR` or `stat/livingroom/POWER1`. The device segment
//! becomes the metric label and the type segment selects the decoder.

/// Separator between topic levels.
pub const TOPIC_SEPARATOR: char = '/';

/// Classification of a message by its topic type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// `STATE`: periodic device state carrying `POWER1`.
    State,
    /// `SENSOR`: periodic sensor readings.
    Sensor,
    /// `RESULT`: command result carrying `POWER`.
    Result,
    /// `POWER1`: raw "ON"/"OFF" payload.
    Power1,
    /// A recognized tag that produces no metric (`POWER`, `LWT`, `UPTIME`).
    Ignored,
    /// A tag outside the recognized set.
    Unknown,
}

impl MessageKind {
    /// Classify a type tag. Comparison is case-sensitive.
    pub fn classify(tag: &str) -> Self {
        match tag {
            "STATE" => MessageKind::State,
            "SENSOR" => MessageKind::Sensor,
            "RESULT" => MessageKind::Result,
            "POWER1" => MessageKind::Power1,
            "POWER" | "LWT" | "UPTIME" => MessageKind::Ignored,
            _ => MessageKind::Unknown,
        }
    }
}

/// Parsed components of a device topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTopic<'a> {
    /// First level, e.g. "tele" or "stat".
    pub prefix: &'a str,
    /// Device (room) name.
    pub device: &'a str,
    /// Raw type tag.
    pub tag: &'a str,
    /// Classification of `tag`.
    pub kind: MessageKind,
}

/// Parse a device topic.
///
/// Returns `None` when the topic has fewer than three levels or the device
/// level is empty. Levels after the type tag are ignored.
pub fn parse_topic(topic: &str) -> Option<ParsedTopic<'_>> {
    let mut parts = topic.split(TOPIC_SEPARATOR);

    let prefix = parts.next()?;
    let device = parts.next()?;
    let tag = parts.next()?;

    if device.is_empty() {
        return None;
    }

    Some(ParsedTopic {
        prefix,
        device,
        tag,
        kind: MessageKind::classify(tag),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_topic() {
        let parsed = parse_topic("tele/kitchen/SENSOR").unwrap();

        assert_eq!(parsed.prefix, "tele");
        assert_eq!(parsed.device, "kitchen");
        assert_eq!(parsed.tag, "SENSOR");
        assert_eq!(parsed.kind, MessageKind::Sensor);
    }

    #[test]
    fn test_parse_topic_extra_levels() {
        let parsed = parse_topic("stat/bedroom/POWER1/extra").unwrap();

        assert_eq!(parsed.device, "bedroom");
        assert_eq!(parsed.kind, MessageKind::Power1);
    }

    #[test]
    fn test_parse_invalid_topic() {
        assert!(parse_topic("").is_none());
        assert!(parse_topic("tele").is_none());
        assert!(parse_topic("tele/kitchen").is_none());
        assert!(parse_topic("tele//SENSOR").is_none());
    }

    #[test]
    fn test_classify() {
        assert_eq!(MessageKind::classify("STATE"), MessageKind::State);
        assert_eq!(MessageKind::classify("SENSOR"), MessageKind::Sensor);
        assert_eq!(MessageKind::classify("RESULT"), MessageKind::Result);
        assert_eq!(MessageKind::classify("POWER1"), MessageKind::Power1);
        assert_eq!(MessageKind::classify("POWER"), MessageKind::Ignored);
        assert_eq!(MessageKind::classify("LWT"), MessageKind::Ignored);
        assert_eq!(MessageKind::classify("UPTIME"), MessageKind::Ignored);
        assert_eq!(MessageKind::classify("INFO1"), MessageKind::Unknown);
        assert_eq!(MessageKind::classify(""), MessageKind::Unknown);
    }

    #[test]
    fn test_classify_is_case_sensitive() {
        assert_eq!(MessageKind::classify("sensor"), MessageKind::Unknown);
        assert_eq!(MessageKind::classify("Power1"), MessageKind::Unknown);
    }
}
