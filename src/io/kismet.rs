//! Kismet capture log source
//!
//! Reads the `devices` table of a Kismet SQLite log:
//!
//! | column      | use                                   |
//! |-------------|---------------------------------------|
//! | `devmac`    | device MAC (validated, normalized)    |
//! | `type`      | device classification                 |
//! | `device`    | JSON device record (probe metadata)   |
//! | `last_time` | unix seconds of the last sighting     |
//!
//! The log is opened read-only; Kismet keeps writing to it while we poll.

use crate::domain::{MacAddress, Sighting, Sightings, SourceError, TimeRange};
use crate::io::source::{SightingSource, SourceConnector};
use chrono::{DateTime, Utc};
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OpenFlags};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

const CAPTURE_EXTENSION: &str = "kismet";

const DEVICES_SINCE: &str = "SELECT devmac, type, device, last_time FROM devices WHERE last_time >= ?1";
const DEVICES_BETWEEN: &str =
    "SELECT devmac, type, device, last_time FROM devices WHERE last_time >= ?1 AND last_time < ?2";

/// Row as stored, before validation.
///
/// Columns are read untyped; a value of the wrong storage class makes the row
/// invalid, never the whole query.
struct RawDevice {
    devmac: String,
    device_type: Option<String>,
    device: Option<Vec<u8>>,
    last_time: f64,
}

impl RawDevice {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Result<Self, String>> {
        let devmac = match text_column(row.get_ref(0)?) {
            Some(Ok(devmac)) => devmac,
            Some(Err(reason)) => return Ok(Err(format!("devmac: {reason}"))),
            None => return Ok(Err("devmac: null".to_string())),
        };
        let device_type = match text_column(row.get_ref(1)?) {
            Some(Ok(device_type)) => Some(device_type),
            _ => None,
        };
        let device = match row.get_ref(2)? {
            ValueRef::Text(bytes) | ValueRef::Blob(bytes) => Some(bytes.to_vec()),
            _ => None,
        };
        let last_time = match row.get_ref(3)? {
            ValueRef::Integer(secs) => secs as f64,
            ValueRef::Real(secs) => secs,
            other => return Ok(Err(format!("last_time: not a number ({:?})", other.data_type()))),
        };

        Ok(Ok(Self { devmac, device_type, device, last_time }))
    }
}

/// UTF-8 text stored as TEXT or BLOB; `None` for NULL
fn text_column(value: ValueRef<'_>) -> Option<Result<String, String>> {
    match value {
        ValueRef::Null => None,
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Some(std::str::from_utf8(bytes).map(str::to_string).map_err(|e| e.to_string()))
        }
        other => Some(Err(format!("not text ({:?})", other.data_type()))),
    }
}

/// Open connection to one capture log
pub struct KismetDb {
    conn: Connection,
    path: PathBuf,
}

impl KismetDb {
    pub fn open(path: &Path, timeout: Duration) -> Result<Self, SourceError> {
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(path, flags)
            .map_err(|e| SourceError::Unavailable(format!("{}: {e}", path.display())))?;
        conn.busy_timeout(timeout)
            .map_err(|e| SourceError::Unavailable(format!("{}: {e}", path.display())))?;

        debug!(path = %path.display(), "kismet_db_opened");
        Ok(Self { conn, path: path.to_path_buf() })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check the log has a readable `devices` table; returns the row count
    pub fn validate(&self) -> Result<u64, SourceError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM devices", [], |row| row.get(0))
            .map_err(|e| SourceError::Query(format!("validation failed: {e}")))?;
        info!(path = %self.path.display(), devices = %count, "kismet_db_validated");
        Ok(count.max(0) as u64)
    }

    fn fetch(&self, range: TimeRange) -> rusqlite::Result<Vec<Result<RawDevice, String>>> {
        let start = range.start.timestamp();
        match range.end {
            Some(end) => {
                let mut stmt = self.conn.prepare_cached(DEVICES_BETWEEN)?;
                let rows = stmt.query_map(params![start, end.timestamp()], RawDevice::from_row)?;
                rows.collect()
            }
            None => {
                let mut stmt = self.conn.prepare_cached(DEVICES_SINCE)?;
                let rows = stmt.query_map(params![start], RawDevice::from_row)?;
                rows.collect()
            }
        }
    }
}

impl SightingSource for KismetDb {
    fn devices_between(&self, range: TimeRange) -> Result<Sightings<Sighting>, SourceError> {
        let rows = self.fetch(range).map_err(|e| SourceError::Query(e.to_string()))?;
        let mut sightings = Vec::with_capacity(rows.len());

        for raw in rows {
            let raw = match raw {
                Ok(raw) => raw,
                Err(reason) => {
                    warn!(reason = %reason, "device_row_skipped");
                    continue;
                }
            };
            let mac = match MacAddress::parse(&raw.devmac) {
                Ok(mac) => mac,
                Err(e) => {
                    warn!(error = %e, "device_row_skipped");
                    continue;
                }
            };
            let Some(last_seen) = unix_seconds(raw.last_time) else {
                warn!(mac = %mac, last_time = %raw.last_time, "device_row_skipped");
                continue;
            };
            // SQLite compares mixed storage classes by type, so re-check in time order
            if !range.contains(last_seen) {
                debug!(mac = %mac, last_time = %raw.last_time, "device_row_out_of_range");
                continue;
            }

            let mut sighting = Sighting::new(mac, last_seen);
            if let Some(device_type) = raw.device_type.as_deref() {
                sighting = sighting.with_device_type(device_type);
            }
            if let Some(device) = raw.device.as_deref().filter(|d| !d.is_empty()) {
                match serde_json::from_slice(device) {
                    Ok(metadata) => sighting = sighting.with_metadata(metadata),
                    Err(e) => {
                        warn!(mac = %sighting.mac, error = %e, "device_json_unparsable");
                        continue;
                    }
                }
            }
            sightings.push(sighting);
        }

        Ok(sightings.into())
    }
}

fn unix_seconds(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    DateTime::from_timestamp_millis((secs * 1000.0) as i64)
}

/// `*.kismet` files directly inside `dir` with their modification times
fn list_captures(dir: &Path) -> Result<Vec<(SystemTime, PathBuf)>, SourceError> {
    let entries = fs::read_dir(dir)
        .map_err(|e| SourceError::Unavailable(format!("{}: {e}", dir.display())))?;

    Ok(entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == CAPTURE_EXTENSION))
        .map(|p| {
            let modified = fs::metadata(&p).and_then(|m| m.modified()).unwrap_or(SystemTime::UNIX_EPOCH);
            (modified, p)
        })
        .collect())
}

/// Resolve the capture to read: the path itself if it is a file, otherwise
/// the most recently modified `*.kismet` file inside it
pub fn find_capture(path: &Path) -> Result<PathBuf, SourceError> {
    if path.is_file() {
        return Ok(path.to_path_buf());
    }

    list_captures(path)?
        .into_iter()
        .max_by(|a, b| a.0.cmp(&b.0))
        .map(|(_, p)| p)
        .ok_or_else(|| {
            SourceError::Unavailable(format!("no *.{CAPTURE_EXTENSION} files found in {}", path.display()))
        })
}

/// Every capture in `dir` modified at or after `since`, oldest first.
///
/// With none that recent, the newest capture alone is returned.
pub fn recent_captures(dir: &Path, since: SystemTime) -> Result<Vec<PathBuf>, SourceError> {
    if dir.is_file() {
        return Ok(vec![dir.to_path_buf()]);
    }

    let mut captures = list_captures(dir)?;
    captures.sort();
    if captures.iter().any(|(modified, _)| *modified >= since) {
        return Ok(captures.into_iter().filter(|(modified, _)| *modified >= since).map(|(_, p)| p).collect());
    }

    match captures.pop() {
        Some((_, newest)) => {
            warn!(capture = %newest.display(), "no_recent_captures_using_newest");
            Ok(vec![newest])
        }
        None => Err(SourceError::Unavailable(format!(
            "no *.{CAPTURE_EXTENSION} files found in {}",
            dir.display()
        ))),
    }
}

/// Opens the resolved capture log once per cycle
#[derive(Debug, Clone)]
pub struct KismetConnector {
    capture: PathBuf,
    timeout: Duration,
}

impl KismetConnector {
    pub fn new(capture: PathBuf, timeout: Duration) -> Self {
        Self { capture, timeout }
    }

    /// Pick the newest capture under `kismet_logs`
    pub fn discover(kismet_logs: &str, timeout: Duration) -> Result<Self, SourceError> {
        let capture = find_capture(Path::new(kismet_logs))?;
        info!(capture = %capture.display(), "kismet_capture_selected");
        Ok(Self::new(capture, timeout))
    }

    pub fn capture(&self) -> &Path {
        &self.capture
    }
}

impl SourceConnector for KismetConnector {
    type Source = KismetDb;

    fn connect(&self) -> Result<KismetDb, SourceError> {
        KismetDb::open(&self.capture, self.timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use tempfile::tempdir;

    const TIMEOUT: Duration = Duration::from_secs(1);

    fn create_capture(path: &Path, rows: &[(&str, Option<&str>, i64)]) {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch(
            "CREATE TABLE devices (devmac TEXT, type TEXT, device BLOB, last_time INT);",
        )
        .unwrap();
        for (mac, device, last_time) in rows {
            conn.execute(
                "INSERT INTO devices (devmac, type, device, last_time) VALUES (?1, 'Wi-Fi Client', ?2, ?3)",
                params![mac, device.map(|d| d.as_bytes().to_vec()), last_time],
            )
            .unwrap();
        }
    }

    fn probe_json(ssid: &str) -> String {
        serde_json::json!({
            "dot11.device": {"dot11.device.last_probed_ssid_record": {"dot11.probedssid.ssid": ssid}}
        })
        .to_string()
    }

    #[test]
    fn test_devices_between_is_half_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("capture.kismet");
        let now = Utc::now();
        let t = now.timestamp();
        create_capture(
            &path,
            &[("11:22:33:44:55:66", None, t - 600), ("aa:bb:cc:dd:ee:01", None, t - 300)],
        );

        let db = KismetDb::open(&path, TIMEOUT).unwrap();
        assert_eq!(db.validate().unwrap(), 2);

        let start = DateTime::from_timestamp(t - 600, 0).unwrap();
        let end = DateTime::from_timestamp(t - 300, 0).unwrap();
        let rows = db.devices_between(TimeRange::between(start, end)).unwrap().into_vec();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].mac.as_str(), "11:22:33:44:55:66");

        let rows = db.devices_between(TimeRange::since(end)).unwrap().into_vec();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].mac.as_str(), "AA:BB:CC:DD:EE:01");
        assert_eq!(rows[0].device_type.as_deref(), Some("Wi-Fi Client"));
    }

    #[test]
    fn test_bad_rows_skipped_not_fatal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("capture.kismet");
        let t = Utc::now().timestamp();
        let probe = probe_json("CorpWiFi");
        create_capture(
            &path,
            &[
                ("not-a-mac", None, t),
                ("11:22:33:44:55:66", Some("{broken"), t),
                ("11:22:33:44:55:77", Some(probe.as_str()), t),
            ],
        );

        let db = KismetDb::open(&path, TIMEOUT).unwrap();
        let range = TimeRange::since(Utc::now() - ChronoDuration::minutes(1));

        let devices = db.devices_between(range).unwrap();
        assert_eq!(devices.len(), 1);

        let probes = db.probes_between(range).unwrap().into_vec();
        assert_eq!(probes.len(), 1);
        assert_eq!(probes[0].ssid.as_str(), "CorpWiFi");
    }

    #[test]
    fn test_wrongly_typed_rows_skipped_not_fatal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("capture.kismet");
        let t = Utc::now().timestamp();
        create_capture(&path, &[("11:22:33:44:55:66", None, t - 30)]);

        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "INSERT INTO devices VALUES ('11:22:33:44:55:77', 'Wi-Fi Client', NULL, 'garbage');
             INSERT INTO devices VALUES (X'FFFE', 'Wi-Fi Client', NULL, 0);
             INSERT INTO devices VALUES (42, 7, NULL, 0);
             INSERT INTO devices VALUES (NULL, NULL, NULL, 0);",
        )
        .unwrap();
        conn.execute(
            "INSERT INTO devices VALUES (?1, NULL, NULL, ?2)",
            params!["aa:bb:cc:dd:ee:01".as_bytes(), t - 10],
        )
        .unwrap();

        let db = KismetDb::open(&path, TIMEOUT).unwrap();

        // A text last_time sorts above every number and would match any open range
        let current = db.devices_between(TimeRange::since(Utc::now() - ChronoDuration::minutes(2))).unwrap();
        let macs: Vec<&str> = current.iter().map(|s| s.mac.as_str()).collect();
        assert_eq!(macs, vec!["11:22:33:44:55:66", "AA:BB:CC:DD:EE:01"]);

        let all = db.devices_between(TimeRange::all()).unwrap();
        assert_eq!(all.len(), 2);

        let windows = crate::domain::TimeWindows::default();
        let filter = crate::services::IgnoreFilter::default();
        let buckets = crate::services::WindowBuckets::initialize(&db, Utc::now(), &windows, &filter).unwrap();
        assert_eq!(buckets.stats().macs[0], 2);
    }

    #[test]
    fn test_empty_range_is_empty_not_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("capture.kismet");
        create_capture(&path, &[]);

        let db = KismetDb::open(&path, TIMEOUT).unwrap();
        let result = db.devices_between(TimeRange::all()).unwrap();
        assert_eq!(result, Sightings::Empty);
    }

    #[test]
    fn test_missing_capture_is_unavailable() {
        let dir = tempdir().unwrap();
        let result = KismetDb::open(&dir.path().join("absent.kismet"), TIMEOUT);
        assert!(matches!(result, Err(SourceError::Unavailable(_))));

        let result = find_capture(dir.path());
        assert!(matches!(result, Err(SourceError::Unavailable(_))));
    }

    #[test]
    fn test_validate_fails_without_devices_table() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.kismet");
        Connection::open(&path).unwrap().execute_batch("CREATE TABLE other (x INT);").unwrap();

        let db = KismetDb::open(&path, TIMEOUT).unwrap();
        assert!(matches!(db.validate(), Err(SourceError::Query(_))));
    }

    #[test]
    fn test_find_capture_picks_kismet_files_only() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();
        let capture = dir.path().join("Kismet-20261019.kismet");
        create_capture(&capture, &[]);

        assert_eq!(find_capture(dir.path()).unwrap(), capture);
        assert_eq!(find_capture(&capture).unwrap(), capture);
    }

    #[test]
    fn test_recent_captures_window_and_fallback() {
        let dir = tempdir().unwrap();
        let older = dir.path().join("Kismet-1.kismet");
        let newer = dir.path().join("Kismet-2.kismet");
        create_capture(&older, &[]);
        create_capture(&newer, &[]);
        fs::write(dir.path().join("Kismet-3.pcap"), "x").unwrap();

        let epoch = SystemTime::UNIX_EPOCH;
        let mut all = recent_captures(dir.path(), epoch).unwrap();
        all.sort();
        assert_eq!(all, vec![older.clone(), newer.clone()]);

        // Nothing modified after the cutoff: the newest capture still comes back
        let future = SystemTime::now() + Duration::from_secs(3600);
        let fallback = recent_captures(dir.path(), future).unwrap();
        assert_eq!(fallback.len(), 1);
        assert!(fallback[0] == older || fallback[0] == newer);

        assert_eq!(recent_captures(&older, future).unwrap(), vec![older.clone()]);

        let empty = tempdir().unwrap();
        assert!(matches!(recent_captures(empty.path(), epoch), Err(SourceError::Unavailable(_))));
    }
}
