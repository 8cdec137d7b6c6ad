//! Probe report over one or more event logs
//!
//! Aggregates decoded events into:
//! - per-SSID probe counts with first/last seen and distinct MACs
//! - per-identity detection counts split by kind and band
//!
//! An optional cutoff drops events older than a given local timestamp.

use crate::domain::{Band, Event, EventKind};
use chrono::NaiveDateTime;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;

/// Probe activity for one SSID
#[derive(Debug, Clone, PartialEq)]
pub struct SsidSummary {
    pub ssid: String,
    pub count: usize,
    pub first_seen: NaiveDateTime,
    pub last_seen: NaiveDateTime,
    pub macs: BTreeSet<String>,
}

impl SsidSummary {
    /// Probes per minute between first and last sighting, if the span is non-zero
    pub fn rate_per_minute(&self) -> Option<f64> {
        let span = (self.last_seen - self.first_seen).num_seconds();
        (span > 0).then(|| self.count as f64 * 60.0 / span as f64)
    }
}

/// Detections of one kind raised for one identity
///
/// A MAC and an SSID can share a spelling ("AA:BB:CC:DD:EE:FF" is a valid
/// SSID), so the kind is part of the key.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionSummary {
    pub kind: EventKind,
    pub identity: String,
    pub count: usize,
    /// Indexed by `Band::index()`
    pub by_band: [usize; 4],
    pub last_seen: NaiveDateTime,
}

impl DetectionSummary {
    pub fn in_band(&self, band: Band) -> usize {
        self.by_band[band.index()]
    }
}

#[derive(Debug, Default)]
pub struct ProbeReport {
    since: Option<NaiveDateTime>,
    ssids: BTreeMap<String, SsidSummary>,
    detections: BTreeMap<(EventKind, String), DetectionSummary>,
    events_seen: usize,
    events_dropped: usize,
}

impl ProbeReport {
    pub fn new(since: Option<NaiveDateTime>) -> Self {
        Self { since, ..Default::default() }
    }

    pub fn since(&self) -> Option<NaiveDateTime> {
        self.since
    }

    pub fn add(&mut self, event: &Event) {
        self.events_seen += 1;
        let timestamp = event.timestamp();
        if self.since.is_some_and(|cutoff| timestamp < cutoff) {
            self.events_dropped += 1;
            return;
        }

        match event {
            Event::SsidProbe { ssid, mac, .. } => {
                let summary = self.ssids.entry(ssid.as_str().to_string()).or_insert_with(|| SsidSummary {
                    ssid: ssid.as_str().to_string(),
                    count: 0,
                    first_seen: timestamp,
                    last_seen: timestamp,
                    macs: BTreeSet::new(),
                });
                summary.count += 1;
                summary.first_seen = summary.first_seen.min(timestamp);
                summary.last_seen = summary.last_seen.max(timestamp);
                summary.macs.insert(mac.as_str().to_string());
            }
            Event::DeviceReappeared { band, .. } | Event::RepeatedProbe { band, .. } => {
                let kind = event.kind();
                let identity = event.identity();
                let summary = self
                    .detections
                    .entry((kind, identity.to_string()))
                    .or_insert_with(|| DetectionSummary {
                        kind,
                        identity: identity.to_string(),
                        count: 0,
                        by_band: [0; 4],
                        last_seen: timestamp,
                    });
                summary.count += 1;
                summary.by_band[band.index()] += 1;
                summary.last_seen = summary.last_seen.max(timestamp);
            }
        }
    }

    pub fn extend<'a>(&mut self, events: impl IntoIterator<Item = &'a Event>) {
        for event in events {
            self.add(event);
        }
    }

    /// Events offered to the report, including those before the cutoff
    pub fn events_seen(&self) -> usize {
        self.events_seen
    }

    pub fn events_dropped(&self) -> usize {
        self.events_dropped
    }

    pub fn ssid(&self, ssid: &str) -> Option<&SsidSummary> {
        self.ssids.get(ssid)
    }

    pub fn detection(&self, kind: EventKind, identity: &str) -> Option<&DetectionSummary> {
        self.detections.get(&(kind, identity.to_string()))
    }

    /// Most-probed first, ties by name
    pub fn ssids_by_count(&self) -> Vec<&SsidSummary> {
        let mut ssids: Vec<_> = self.ssids.values().collect();
        ssids.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.ssid.cmp(&b.ssid)));
        ssids
    }

    /// Most-detected first, ties by kind then identity
    pub fn detections_by_count(&self) -> Vec<&DetectionSummary> {
        let mut detections: Vec<_> = self.detections.values().collect();
        detections.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.kind.cmp(&b.kind))
                .then_with(|| a.identity.cmp(&b.identity))
        });
        detections
    }

    pub fn is_empty(&self) -> bool {
        self.ssids.is_empty() && self.detections.is_empty()
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let fmt = crate::domain::event::TIMESTAMP_FORMAT;

        match self.since {
            Some(cutoff) => {
                let _ = writeln!(out, "Events since {}", cutoff.format(fmt));
            }
            None => out.push_str("All events\n"),
        }
        let _ = writeln!(
            out,
            "{} events read, {} before cutoff",
            self.events_seen, self.events_dropped
        );

        if self.is_empty() {
            out.push_str("\nNo probe requests or detections found.\n");
            return out;
        }

        let ssids = self.ssids_by_count();
        let _ = writeln!(out, "\nFound {} unique SSIDs in probe requests:", ssids.len());
        out.push_str(&"-".repeat(50));
        out.push('\n');
        for summary in ssids {
            let _ = writeln!(out, "\nSSID: {}", summary.ssid);
            let _ = writeln!(out, "Times seen: {}", summary.count);
            let _ = writeln!(out, "Distinct MACs: {}", summary.macs.len());
            let _ = writeln!(out, "First seen: {}", summary.first_seen.format(fmt));
            let _ = writeln!(out, "Last seen: {}", summary.last_seen.format(fmt));
            if let Some(rate) = summary.rate_per_minute() {
                let _ = writeln!(out, "Average frequency: {rate:.2} probes/minute");
            }
        }

        let detections = self.detections_by_count();
        if !detections.is_empty() {
            let _ = writeln!(out, "\nDetections ({} identities):", detections.len());
            out.push_str(&"-".repeat(50));
            out.push('\n');
            for summary in detections {
                let bands: Vec<String> = Band::HISTORICAL
                    .iter()
                    .filter(|band| summary.in_band(**band) > 0)
                    .map(|band| format!("{}={}", band, summary.in_band(*band)))
                    .collect();
                let _ = writeln!(
                    out,
                    "{}  {} count={} bands[{}]",
                    summary.kind,
                    summary.identity,
                    summary.count,
                    bands.join(" ")
                );
            }
        }

        out
    }
}
