//! Event records written to the append-only event log
//!
//! Each record is one JSON object per line. The `type` field is the
//! discriminant; decoding matches on it rather than on the shape of the
//! remaining fields.

use crate::domain::identity::{MacAddress, Ssid};
use crate::domain::window::Band;
use chrono::{DateTime, Local, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Timestamp format used in event records (local wall-clock time)
pub const TIMESTAMP_FORMAT: &str = "%m/%d/%Y %H:%M:%S";

/// Kind of event, mirrors the serialized `type` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventKind {
    SsidProbe,
    DeviceReappeared,
    RepeatedProbe,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::SsidProbe => "ssid-probe",
            EventKind::DeviceReappeared => "device-reappeared",
            EventKind::RepeatedProbe => "repeated-probe",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record in the event log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Event {
    /// A current-activity probe request that passed the SSID ignore list
    SsidProbe {
        #[serde(with = "event_timestamp")]
        timestamp: NaiveDateTime,
        ssid: Ssid,
        mac: MacAddress,
    },
    /// A current-activity device that was also seen in an older band
    DeviceReappeared {
        #[serde(with = "event_timestamp")]
        timestamp: NaiveDateTime,
        mac: MacAddress,
        band: Band,
        window: String,
    },
    /// A current-activity probed SSID that was also probed in an older band
    RepeatedProbe {
        #[serde(with = "event_timestamp")]
        timestamp: NaiveDateTime,
        ssid: Ssid,
        band: Band,
        window: String,
    },
}

impl Event {
    pub fn probe(at: DateTime<Utc>, ssid: Ssid, mac: MacAddress) -> Self {
        Event::SsidProbe { timestamp: local_time(at), ssid, mac }
    }

    pub fn device_reappeared(at: DateTime<Utc>, mac: MacAddress, band: Band, window: String) -> Self {
        Event::DeviceReappeared { timestamp: local_time(at), mac, band, window }
    }

    pub fn repeated_probe(at: DateTime<Utc>, ssid: Ssid, band: Band, window: String) -> Self {
        Event::RepeatedProbe { timestamp: local_time(at), ssid, band, window }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Event::SsidProbe { .. } => EventKind::SsidProbe,
            Event::DeviceReappeared { .. } => EventKind::DeviceReappeared,
            Event::RepeatedProbe { .. } => EventKind::RepeatedProbe,
        }
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        match self {
            Event::SsidProbe { timestamp, .. }
            | Event::DeviceReappeared { timestamp, .. }
            | Event::RepeatedProbe { timestamp, .. } => *timestamp,
        }
    }

    /// Band matched, for detection events
    pub fn band(&self) -> Option<Band> {
        match self {
            Event::SsidProbe { .. } => None,
            Event::DeviceReappeared { band, .. } | Event::RepeatedProbe { band, .. } => Some(*band),
        }
    }

    /// The tracked identity this event is about (MAC or SSID)
    pub fn identity(&self) -> &str {
        match self {
            Event::SsidProbe { ssid, .. } | Event::RepeatedProbe { ssid, .. } => ssid.as_str(),
            Event::DeviceReappeared { mac, .. } => mac.as_str(),
        }
    }

    pub fn is_detection(&self) -> bool {
        !matches!(self, Event::SsidProbe { .. })
    }

    pub fn to_json_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json_line(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line.trim())
    }
}

fn local_time(at: DateTime<Utc>) -> NaiveDateTime {
    at.with_timezone(&Local).naive_local()
}

mod event_timestamp {
    use super::TIMESTAMP_FORMAT;
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(ts: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&ts.format(TIMESTAMP_FORMAT))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, TIMESTAMP_FORMAT).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap().and_hms_opt(13, 5, 0).unwrap()
    }

    fn mac() -> MacAddress {
        MacAddress::parse("11:22:33:44:55:66").unwrap()
    }

    #[test]
    fn test_probe_event_wire_format() {
        let event = Event::SsidProbe { timestamp: ts(), ssid: Ssid::parse("CorpWiFi").unwrap(), mac: mac() };
        let line = event.to_json_line().unwrap();
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();

        assert_eq!(value["type"], "ssid-probe");
        assert_eq!(value["timestamp"], "10/19/2026 13:05:00");
        assert_eq!(value["ssid"], "CorpWiFi");
        assert_eq!(value["mac"], "11:22:33:44:55:66");
        assert!(!line.contains('\n'));
    }

    #[test]
    fn test_detection_event_carries_band_and_window() {
        let event = Event::DeviceReappeared {
            timestamp: ts(),
            mac: mac(),
            band: Band::Medium,
            window: "5-10 min".to_string(),
        };
        let value: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "device-reappeared");
        assert_eq!(value["band"], "medium");
        assert_eq!(value["window"], "5-10 min");
        assert_eq!(event.kind().as_str(), "device-reappeared");
        assert!(event.is_detection());
    }

    #[test]
    fn test_decode_dispatches_on_type() {
        let line = r#"{"type":"repeated-probe","timestamp":"01/02/2026 03:04:05","ssid":"FreeWiFi","band":"old","window":"10-15 min"}"#;
        let event = Event::from_json_line(line).unwrap();
        assert_eq!(event.kind(), EventKind::RepeatedProbe);
        assert_eq!(event.identity(), "FreeWiFi");
        assert_eq!(event.band(), Some(Band::Old));
    }

    #[test]
    fn test_decode_rejects_unknown_type_and_bad_timestamp() {
        assert!(Event::from_json_line(r#"{"type":"teleport","timestamp":"01/02/2026 03:04:05"}"#).is_err());
        assert!(Event::from_json_line(
            r#"{"type":"ssid-probe","timestamp":"2026-01-02 03-04-05","ssid":"x","mac":"11:22:33:44:55:66"}"#
        )
        .is_err());
    }
}
