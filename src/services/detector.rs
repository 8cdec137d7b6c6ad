//! Detection engine
//!
//! Compares current activity against the historical bands:
//! - every allowed probed SSID yields a probe event, then one repeated-probe
//!   event per historical band that holds the SSID
//! - every allowed MAC yields one device-reappeared event per historical band
//!   that holds it
//!
//! The newest band is never compared; current activity is part of it.

use crate::domain::{Event, SightingError, SourceError, TimeWindows};
use crate::io::source::SightingSource;
use crate::services::filter::IgnoreFilter;
use crate::services::windows::WindowBuckets;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

/// Result of one current-activity pass
#[derive(Debug, Default)]
pub struct Detection {
    /// Events in emission order
    pub events: Vec<Event>,
    pub sightings: usize,
    /// Sightings dropped for malformed metadata
    pub skipped: usize,
}

impl Detection {
    pub fn probe_count(&self) -> usize {
        self.events.iter().filter(|e| !e.is_detection()).count()
    }

    pub fn detection_count(&self) -> usize {
        self.events.iter().filter(|e| e.is_detection()).count()
    }
}

pub struct Detector {
    windows: TimeWindows,
    filter: IgnoreFilter,
}

impl Detector {
    pub fn new(windows: TimeWindows, filter: IgnoreFilter) -> Self {
        Self { windows, filter }
    }

    pub fn windows(&self) -> &TimeWindows {
        &self.windows
    }

    pub fn filter(&self) -> &IgnoreFilter {
        &self.filter
    }

    /// Query current activity and check it against `buckets`.
    ///
    /// A source failure is returned untouched for the caller to skip the
    /// cycle. Faults in a single sighting are logged and do not stop the batch.
    pub fn process_current_activity<S: SightingSource + ?Sized>(
        &self,
        source: &S,
        now: DateTime<Utc>,
        buckets: &WindowBuckets,
    ) -> Result<Detection, SourceError> {
        let range = self.windows.boundaries(now).current_range();
        let current = source.devices_between(range)?;

        let mut detection = Detection { sightings: current.len(), ..Default::default() };
        if current.is_empty() {
            debug!("no_current_activity");
            return Ok(detection);
        }

        for sighting in current.iter() {
            let mac = &sighting.mac;

            let probed = match sighting.probed_ssid() {
                Ok(probed) => probed,
                Err(e @ SightingError::Malformed { .. }) => {
                    warn!(mac = %mac, error = %e, "sighting_skipped");
                    detection.skipped += 1;
                    continue;
                }
                Err(e) => {
                    warn!(mac = %mac, error = %e, "probe_rejected");
                    None
                }
            };

            if let Some(ssid) = probed.filter(|ssid| self.filter.allows_ssid(ssid)) {
                info!(ssid = %ssid, mac = %mac, "ssid_probe");
                detection.events.push(Event::probe(now, ssid.clone(), mac.clone()));

                for band in buckets.ssids().historical_matches(&ssid) {
                    let window = self.windows.label(band);
                    warn!(ssid = %ssid, band = %band, window = %window, "repeated_probe");
                    detection.events.push(Event::repeated_probe(now, ssid.clone(), band, window));
                }
            }

            if self.filter.allows_mac(mac) {
                for band in buckets.macs().historical_matches(mac) {
                    let window = self.windows.label(band);
                    warn!(mac = %mac, band = %band, window = %window, "device_reappeared");
                    detection.events.push(Event::device_reappeared(now, mac.clone(), band, window));
                }
            }
        }

        debug!(
            sightings = %detection.sightings,
            skipped = %detection.skipped,
            events = %detection.events.len(),
            "current_activity_processed"
        );
        Ok(detection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Band, EventKind, MacAddress, Sighting, Ssid};
    use crate::io::memory::MemorySource;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
    }

    fn ago(d: Duration) -> DateTime<Utc> {
        now() - d
    }

    fn mac(raw: &str) -> MacAddress {
        MacAddress::parse(raw).unwrap()
    }

    fn ssid(raw: &str) -> Ssid {
        Ssid::parse(raw).unwrap()
    }

    fn run(source: &MemorySource, filter: IgnoreFilter) -> Detection {
        let windows = TimeWindows::default();
        let buckets = WindowBuckets::initialize(source, now(), &windows, &filter).unwrap();
        Detector::new(windows, filter).process_current_activity(source, now(), &buckets).unwrap()
    }

    #[test]
    fn test_mac_reappearing_from_medium_band() {
        let source = MemorySource::new();
        source.push(Sighting::new(mac("11:22:33:44:55:66"), ago(Duration::minutes(7))));
        source.push(Sighting::new(mac("11:22:33:44:55:66"), ago(Duration::seconds(30))));

        let detection = run(&source, IgnoreFilter::default());
        assert_eq!(detection.events.len(), 1);
        match &detection.events[0] {
            Event::DeviceReappeared { mac: m, band, window, .. } => {
                assert_eq!(m.as_str(), "11:22:33:44:55:66");
                assert_eq!(*band, Band::Medium);
                assert_eq!(window, "5-10 min");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_recent_band_alone_is_not_a_detection() {
        let source = MemorySource::new();
        source.push(Sighting::new(mac("11:22:33:44:55:66"), ago(Duration::minutes(3))));
        source.push(Sighting::new(mac("11:22:33:44:55:66"), ago(Duration::seconds(30))));

        assert!(run(&source, IgnoreFilter::default()).events.is_empty());
    }

    #[test]
    fn test_probe_precedes_its_detections() {
        let source = MemorySource::new();
        source.push(Sighting::new(mac("00:00:00:00:00:01"), ago(Duration::minutes(12))).with_probe("FreeWiFi"));
        source.push(Sighting::new(mac("00:00:00:00:00:02"), ago(Duration::minutes(1))).with_probe("FreeWiFi"));

        let detection = run(&source, IgnoreFilter::default());
        let kinds: Vec<EventKind> = detection.events.iter().map(Event::kind).collect();
        assert_eq!(kinds, vec![EventKind::SsidProbe, EventKind::RepeatedProbe]);
        assert_eq!(detection.events[1].band(), Some(Band::Old));
        assert_eq!(detection.probe_count(), 1);
        assert_eq!(detection.detection_count(), 1);
    }

    #[test]
    fn test_one_event_per_matching_band() {
        let source = MemorySource::new();
        let m = "11:22:33:44:55:66";
        for minutes in [7, 12, 17] {
            source.push(Sighting::new(mac(m), ago(Duration::minutes(minutes))));
        }
        source.push(Sighting::new(mac(m), ago(Duration::seconds(10))));

        let bands: Vec<Option<Band>> =
            run(&source, IgnoreFilter::default()).events.iter().map(Event::band).collect();
        assert_eq!(bands, vec![Some(Band::Medium), Some(Band::Old), Some(Band::Oldest)]);
    }

    #[test]
    fn test_ignored_identities_never_detected() {
        let source = MemorySource::new();
        let m = mac("AA:BB:CC:DD:EE:FF");
        source.push(Sighting::new(m.clone(), ago(Duration::minutes(7))).with_probe("HomeNet"));
        source.push(Sighting::new(m.clone(), ago(Duration::seconds(30))).with_probe("HomeNet"));

        let filter = IgnoreFilter::new([m], [ssid("HomeNet")]);
        assert!(run(&source, filter).events.is_empty());
    }

    #[test]
    fn test_empty_ssid_yields_nothing() {
        let source = MemorySource::new();
        source.push(Sighting::new(mac("11:22:33:44:55:66"), ago(Duration::seconds(30))).with_probe(""));

        assert!(run(&source, IgnoreFilter::default()).events.is_empty());
    }

    #[test]
    fn test_malformed_sighting_skipped_batch_continues() {
        let source = MemorySource::new();
        source.push(
            Sighting::new(mac("00:00:00:00:00:01"), ago(Duration::seconds(20)))
                .with_metadata(json!({"dot11.device": 17})),
        );
        source.push(Sighting::new(mac("00:00:00:00:00:02"), ago(Duration::seconds(10))).with_probe("CorpWiFi"));

        let detection = run(&source, IgnoreFilter::default());
        assert_eq!(detection.sightings, 2);
        assert_eq!(detection.skipped, 1);
        assert_eq!(detection.probe_count(), 1);
    }

    #[test]
    fn test_invalid_probe_still_checks_mac() {
        let source = MemorySource::new();
        let m = mac("11:22:33:44:55:66");
        source.push(Sighting::new(m.clone(), ago(Duration::minutes(7))));
        source.push(Sighting::new(m, ago(Duration::seconds(30))).with_probe("<script>"));

        let detection = run(&source, IgnoreFilter::default());
        assert_eq!(detection.skipped, 0);
        assert_eq!(detection.probe_count(), 0);
        assert_eq!(detection.detection_count(), 1);
    }

    #[test]
    fn test_source_failure_propagates() {
        let source = MemorySource::new();
        let windows = TimeWindows::default();
        let buckets =
            WindowBuckets::initialize(&source, now(), &windows, &IgnoreFilter::default()).unwrap();
        source.set_offline(true);

        let detector = Detector::new(windows, IgnoreFilter::default());
        assert!(detector.process_current_activity(&source, now(), &buckets).is_err());
    }
}
