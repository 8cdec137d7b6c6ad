//! In-memory sighting source
//!
//! Backs replay mode (sightings recorded to JSONL) and deterministic tests.
//! Clones share the same rows, so a test can keep a handle, push sightings or
//! take the source offline while a monitor holds the connector.

use crate::domain::{MacAddress, Sighting, Sightings, SourceError, TimeRange};
use crate::io::source::{SightingSource, SourceConnector};
use anyhow::Context;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// One recorded device row, same columns as a Kismet `devices` row
#[derive(Debug, Deserialize)]
struct RecordedSighting {
    mac: String,
    #[serde(rename = "type", default)]
    device_type: Option<String>,
    #[serde(default)]
    device: Option<Value>,
    /// Unix seconds
    last_time: f64,
}

#[derive(Default)]
struct Inner {
    rows: Vec<Sighting>,
    offline: bool,
}

#[derive(Clone, Default)]
pub struct MemorySource {
    inner: Arc<RwLock<Inner>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, sighting: Sighting) {
        self.inner.write().rows.push(sighting);
    }

    pub fn clear(&self) {
        self.inner.write().rows.clear();
    }

    /// Simulate an unreachable store; every query and connect fails
    pub fn set_offline(&self, offline: bool) {
        self.inner.write().offline = offline;
    }

    /// Shift every sighting so the newest one lands at `newest`.
    ///
    /// Replay uses this so a recording made earlier is seen as recent activity.
    pub fn rebase(&self, newest: DateTime<Utc>) {
        let mut inner = self.inner.write();
        let Some(latest) = inner.rows.iter().map(|s| s.last_seen).max() else {
            return;
        };
        let offset = newest - latest;
        for sighting in inner.rows.iter_mut() {
            sighting.last_seen += offset;
        }
        info!(offset_secs = %offset.num_seconds(), "replay_rebased");
    }

    pub fn len(&self) -> usize {
        self.inner.read().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Load recorded sightings, one JSON object per line.
    ///
    /// Lines that fail to parse, or carry an invalid MAC, are skipped.
    pub fn load_jsonl<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read replay file {}", path.display()))?;

        let source = Self::new();
        let mut skipped = 0usize;
        for (line_no, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match parse_recorded(line) {
                Ok(sighting) => source.push(sighting),
                Err(reason) => {
                    skipped += 1;
                    warn!(line = %(line_no + 1), reason = %reason, "replay_line_skipped");
                }
            }
        }

        info!(path = %path.display(), sightings = %source.len(), skipped = %skipped, "replay_loaded");
        Ok(source)
    }
}

fn parse_recorded(line: &str) -> Result<Sighting, String> {
    let record: RecordedSighting = serde_json::from_str(line).map_err(|e| e.to_string())?;
    let mac = MacAddress::parse(&record.mac).map_err(|e| e.to_string())?;
    let last_seen = DateTime::from_timestamp_millis((record.last_time * 1000.0) as i64)
        .ok_or_else(|| format!("timestamp out of range: {}", record.last_time))?;

    let mut sighting = Sighting::new(mac, last_seen);
    if let Some(device_type) = record.device_type.as_deref() {
        sighting = sighting.with_device_type(device_type);
    }
    if let Some(device) = record.device.filter(|d| !d.is_null()) {
        sighting = sighting.with_metadata(device);
    }
    Ok(sighting)
}

impl SightingSource for MemorySource {
    fn devices_between(&self, range: TimeRange) -> Result<Sightings<Sighting>, SourceError> {
        let inner = self.inner.read();
        if inner.offline {
            return Err(SourceError::Unavailable("memory source offline".to_string()));
        }
        let rows: Vec<Sighting> =
            inner.rows.iter().filter(|s| range.contains(s.last_seen)).cloned().collect();
        Ok(rows.into())
    }
}

impl SourceConnector for MemorySource {
    type Source = MemorySource;

    fn connect(&self) -> Result<MemorySource, SourceError> {
        if self.inner.read().offline {
            return Err(SourceError::Unavailable("memory source offline".to_string()));
        }
        Ok(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn mac(raw: &str) -> MacAddress {
        MacAddress::parse(raw).unwrap()
    }

    #[test]
    fn test_range_filtering() {
        let now = Utc::now();
        let source = MemorySource::new();
        source.push(Sighting::new(mac("11:22:33:44:55:66"), now - Duration::minutes(7)));
        source.push(Sighting::new(mac("11:22:33:44:55:77"), now - Duration::seconds(30)));

        let range = TimeRange::between(now - Duration::minutes(10), now - Duration::minutes(5));
        let rows = source.devices_between(range).unwrap().into_vec();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].mac.as_str(), "11:22:33:44:55:66");

        let empty = TimeRange::between(now - Duration::hours(2), now - Duration::hours(1));
        assert_eq!(source.devices_between(empty).unwrap(), Sightings::Empty);
    }

    #[test]
    fn test_offline_fails_queries_and_connect() {
        let source = MemorySource::new();
        source.set_offline(true);
        assert!(source.devices_between(TimeRange::all()).is_err());
        assert!(source.connect().is_err());

        source.set_offline(false);
        assert!(source.connect().is_ok());
    }

    #[test]
    fn test_clones_share_rows() {
        let source = MemorySource::new();
        let handle = source.clone();
        handle.push(Sighting::new(mac("11:22:33:44:55:66"), Utc::now()));
        assert_eq!(source.len(), 1);
    }

    #[test]
    fn test_load_jsonl_skips_bad_lines() {
        let now = Utc::now().timestamp();
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"mac":"11:22:33:44:55:66","type":"Wi-Fi Client","device":{{"dot11.device":{{"dot11.device.last_probed_ssid_record":{{"dot11.probedssid.ssid":"FreeWiFi"}}}}}},"last_time":{now}}}"#
        )
        .unwrap();
        writeln!(file, r#"{{"mac":"zz:zz","last_time":{now}}}"#).unwrap();
        writeln!(file, "not json").unwrap();
        writeln!(file).unwrap();
        writeln!(file, r#"{{"mac":"aa-bb-cc-dd-ee-ff","last_time":{now}}}"#).unwrap();

        let source = MemorySource::load_jsonl(file.path()).unwrap();
        assert_eq!(source.len(), 2);

        let probes = source.probes_between(TimeRange::all()).unwrap().into_vec();
        assert_eq!(probes.len(), 1);
        assert_eq!(probes[0].ssid.as_str(), "FreeWiFi");
    }

    #[test]
    fn test_rebase_keeps_relative_ages() {
        let then = Utc::now() - Duration::days(3);
        let source = MemorySource::new();
        source.push(Sighting::new(mac("11:22:33:44:55:66"), then - Duration::minutes(7)));
        source.push(Sighting::new(mac("11:22:33:44:55:77"), then));

        let now = Utc::now();
        source.rebase(now);

        let recent = source.devices_between(TimeRange::since(now - Duration::minutes(1))).unwrap();
        assert_eq!(recent.len(), 1);
        let older = TimeRange::between(now - Duration::minutes(10), now - Duration::minutes(5));
        assert_eq!(source.devices_between(older).unwrap().len(), 1);
    }

    #[test]
    fn test_load_jsonl_missing_file_errors() {
        assert!(MemorySource::load_jsonl("does/not/exist.jsonl").is_err());
    }
}
