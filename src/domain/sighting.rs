//! Raw device observations produced by a sighting source
//!
//! Sightings are transient: every query builds them fresh and nothing here is
//! persisted by the engine.

use crate::domain::error::SightingError;
use crate::domain::identity::{MacAddress, Ssid};
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Kismet metadata keys leading to the last probed network name
const DOT11_DEVICE: &str = "dot11.device";
const LAST_PROBED_RECORD: &str = "dot11.device.last_probed_ssid_record";
const PROBED_SSID: &str = "dot11.probedssid.ssid";

/// One device observation
#[derive(Debug, Clone, PartialEq)]
pub struct Sighting {
    pub mac: MacAddress,
    /// Device classification reported by the capture backend (e.g. `Wi-Fi Client`)
    pub device_type: Option<String>,
    /// Structured device record as stored by the backend
    pub metadata: Option<Value>,
    pub last_seen: DateTime<Utc>,
}

impl Sighting {
    pub fn new(mac: MacAddress, last_seen: DateTime<Utc>) -> Self {
        Self { mac, device_type: None, metadata: None, last_seen }
    }

    pub fn with_device_type(mut self, device_type: &str) -> Self {
        self.device_type = Some(device_type.to_string());
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Build the metadata record a capture backend stores for a probing device
    pub fn with_probe(self, ssid: &str) -> Self {
        self.with_metadata(serde_json::json!({
            DOT11_DEVICE: {
                LAST_PROBED_RECORD: {
                    PROBED_SSID: ssid
                }
            }
        }))
    }

    /// Extract the last probed network name.
    ///
    /// Missing metadata or a missing probe record means the device is not
    /// probing (`Ok(None)`). A record of the wrong shape is malformed.
    pub fn probed_ssid(&self) -> Result<Option<Ssid>, SightingError> {
        let Some(metadata) = &self.metadata else {
            return Ok(None);
        };
        let malformed = |reason: &str| SightingError::Malformed {
            mac: self.mac.to_string(),
            reason: reason.to_string(),
        };

        let Some(root) = metadata.as_object() else {
            return Err(malformed("device record is not an object"));
        };
        let dot11 = match root.get(DOT11_DEVICE) {
            None | Some(Value::Null) => return Ok(None),
            Some(Value::Object(dot11)) => dot11,
            Some(_) => return Err(malformed("dot11.device is not an object")),
        };
        let record = match dot11.get(LAST_PROBED_RECORD) {
            None | Some(Value::Null) => return Ok(None),
            Some(Value::Object(record)) => record,
            Some(_) => return Err(malformed("last probed SSID record is not an object")),
        };
        match record.get(PROBED_SSID) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(raw)) => Ssid::parse(raw)
                .map(Some)
                .map_err(|source| SightingError::InvalidProbe { mac: self.mac.to_string(), source }),
            Some(_) => Err(malformed("probed SSID is not a string")),
        }
    }
}

/// A probe request: a device and the network it asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeSighting {
    pub mac: MacAddress,
    pub ssid: Ssid,
    pub last_seen: DateTime<Utc>,
}

/// Outcome of a successful query.
///
/// `Empty` is a normal result distinct from a failed query, which is reported
/// through `SourceError` instead.
#[derive(Debug, Clone, PartialEq)]
pub enum Sightings<T> {
    Found(Vec<T>),
    Empty,
}

impl<T> Sightings<T> {
    pub fn len(&self) -> usize {
        match self {
            Sightings::Found(rows) => rows.len(),
            Sightings::Empty => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_vec(self) -> Vec<T> {
        match self {
            Sightings::Found(rows) => rows,
            Sightings::Empty => Vec::new(),
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        match self {
            Sightings::Found(rows) => rows.iter(),
            Sightings::Empty => <&[T]>::default().iter(),
        }
    }
}

impl<T> From<Vec<T>> for Sightings<T> {
    fn from(rows: Vec<T>) -> Self {
        if rows.is_empty() {
            Sightings::Empty
        } else {
            Sightings::Found(rows)
        }
    }
}
