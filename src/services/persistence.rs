//! Persistence scoring across captures
//!
//! The band detector only sees the last twenty minutes. This pass works on
//! whole captures instead: every capture is one appearance per device,
//! labelled with where it was taken. A device that keeps showing up over
//! hours, and especially at different places, scores high.
//!
//! Scoring, per device:
//! - fewer than `min_appearances` or a span under `min_span_hours` scores 0
//! - rate = appearances / span hours; below 0.5 per hour scores 0
//! - otherwise score = min(rate / 2, 1), plus 0.3 (capped at 1) when seen at
//!   more than one location
//!
//! Devices scoring above `min_score` are reported, highest first.

use crate::domain::{MacAddress, Sightings, SourceError, Ssid, TimeRange};
use crate::infra::AnalysisConfig;
use crate::io::SightingSource;
use crate::services::IgnoreFilter;
use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Appearances per hour a device needs before it scores at all
const MIN_RATE_PER_HOUR: f64 = 0.5;
const MULTI_LOCATION_BONUS: f64 = 0.3;

/// Stalking indicators, checked on already persistent devices
const STALKING_MIN_LOCATIONS: usize = 3;
const STALKING_MIN_APPEARANCES: usize = 10;
const STALKING_MIN_SPAN_HOURS: f64 = 24.0;
const STALKING_MIN_SCORE: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PersistenceThresholds {
    pub min_appearances: usize,
    pub min_span_hours: f64,
    pub min_score: f64,
    pub stalking_min_score: f64,
}

impl Default for PersistenceThresholds {
    fn default() -> Self {
        Self::from(&AnalysisConfig::default())
    }
}

impl From<&AnalysisConfig> for PersistenceThresholds {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            min_appearances: config.min_appearances,
            min_span_hours: config.min_span_hours,
            min_score: config.min_score,
            stalking_min_score: config.stalking_min_score,
        }
    }
}

/// One device seen at one place and time
#[derive(Debug, Clone, PartialEq)]
pub struct Appearance {
    pub mac: MacAddress,
    pub at: DateTime<Utc>,
    pub location: String,
    pub ssids: Vec<Ssid>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SuspiciousDevice {
    pub mac: MacAddress,
    pub score: f64,
    pub reasons: Vec<String>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub appearances: usize,
    pub locations: BTreeSet<String>,
    /// Every SSID the device probed for
    pub ssids: BTreeSet<Ssid>,
}

impl SuspiciousDevice {
    pub fn span_hours(&self) -> f64 {
        span_hours(self.first_seen, self.last_seen)
    }
}

/// Extra stalking indicators for a highly persistent device
#[derive(Debug, Clone, PartialEq)]
pub struct StalkingAssessment {
    pub mac: MacAddress,
    pub score: f64,
    pub reasons: Vec<String>,
}

fn span_hours(first: DateTime<Utc>, last: DateTime<Utc>) -> f64 {
    (last - first).num_milliseconds() as f64 / 3_600_000.0
}

/// Score one device's appearances; 0 with no reasons when it is not persistent
pub fn persistence_score(appearances: &[Appearance], thresholds: &PersistenceThresholds) -> (f64, Vec<String>) {
    let mut reasons = Vec::new();
    if appearances.len() < thresholds.min_appearances {
        return (0.0, reasons);
    }

    let (Some(first), Some(last)) =
        (appearances.iter().map(|a| a.at).min(), appearances.iter().map(|a| a.at).max())
    else {
        return (0.0, reasons);
    };
    let span = span_hours(first, last);
    if span < thresholds.min_span_hours {
        return (0.0, reasons);
    }

    let rate = appearances.len() as f64 / span;
    if rate < MIN_RATE_PER_HOUR {
        return (0.0, reasons);
    }

    let mut score = (rate / 2.0).min(1.0);
    reasons.push(format!("Appeared {} times over {:.1} hours", appearances.len(), span));

    let locations: BTreeSet<&str> = appearances.iter().map(|a| a.location.as_str()).collect();
    if locations.len() > 1 {
        reasons.push(format!("Followed across {} different locations", locations.len()));
        score = (score + MULTI_LOCATION_BONUS).min(1.0);
    }

    (score, reasons)
}

/// Accumulates appearances from any number of captures and ranks devices
#[derive(Debug, Default)]
pub struct PersistenceAnalyzer {
    thresholds: PersistenceThresholds,
    history: FxHashMap<MacAddress, Vec<Appearance>>,
    total: usize,
}

impl PersistenceAnalyzer {
    pub fn new(thresholds: PersistenceThresholds) -> Self {
        Self { thresholds, ..Default::default() }
    }

    pub fn add_appearance(&mut self, appearance: Appearance) {
        self.total += 1;
        self.history.entry(appearance.mac.clone()).or_default().push(appearance);
    }

    /// Record every device in `source` as seen at `location`.
    ///
    /// Ignored MACs are dropped, as are ignored or unreadable probe records.
    /// Returns the number of appearances added.
    pub fn add_source<S: SightingSource>(
        &mut self,
        source: &S,
        location: &str,
        filter: &IgnoreFilter,
    ) -> Result<usize, SourceError> {
        let devices = match source.devices_between(TimeRange::all())? {
            Sightings::Found(devices) => devices,
            Sightings::Empty => {
                info!(location = %location, "capture_empty");
                return Ok(0);
            }
        };

        let mut added = 0usize;
        for sighting in devices {
            // Kismet writes 0 for devices it never timestamped
            if sighting.last_seen.timestamp() <= 0 || !filter.allows_mac(&sighting.mac) {
                continue;
            }
            let ssids = match sighting.probed_ssid() {
                Ok(Some(ssid)) if !ssid.is_empty() && filter.allows_ssid(&ssid) => vec![ssid],
                Ok(_) => Vec::new(),
                Err(e) => {
                    debug!(mac = %sighting.mac, error = %e, "probe_record_skipped");
                    Vec::new()
                }
            };
            self.add_appearance(Appearance {
                mac: sighting.mac,
                at: sighting.last_seen,
                location: location.to_string(),
                ssids,
            });
            added += 1;
        }

        info!(location = %location, appearances = %added, "capture_loaded");
        Ok(added)
    }

    pub fn total_appearances(&self) -> usize {
        self.total
    }

    pub fn unique_devices(&self) -> usize {
        self.history.len()
    }

    pub fn locations(&self) -> BTreeSet<&str> {
        self.history.values().flatten().map(|a| a.location.as_str()).collect()
    }

    /// Persistent devices, highest score first (ties by MAC)
    pub fn analyze(&self) -> Vec<SuspiciousDevice> {
        let mut suspicious: Vec<SuspiciousDevice> = self
            .history
            .iter()
            .filter_map(|(mac, appearances)| {
                let (score, reasons) = persistence_score(appearances, &self.thresholds);
                if score <= self.thresholds.min_score {
                    return None;
                }
                Some(SuspiciousDevice {
                    mac: mac.clone(),
                    score,
                    reasons,
                    first_seen: appearances.iter().map(|a| a.at).min()?,
                    last_seen: appearances.iter().map(|a| a.at).max()?,
                    appearances: appearances.len(),
                    locations: appearances.iter().map(|a| a.location.clone()).collect(),
                    ssids: appearances.iter().flat_map(|a| a.ssids.iter().cloned()).collect(),
                })
            })
            .collect();

        suspicious.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.mac.cmp(&b.mac)));
        suspicious
    }

    /// Stalking indicators for devices at or above `stalking_min_score`
    pub fn stalking(&self, devices: &[SuspiciousDevice]) -> Vec<StalkingAssessment> {
        devices
            .iter()
            .filter(|device| device.score >= self.thresholds.stalking_min_score)
            .filter_map(assess_stalking)
            .collect()
    }
}

fn assess_stalking(device: &SuspiciousDevice) -> Option<StalkingAssessment> {
    let mut score = 0.0;
    let mut reasons = Vec::new();

    if device.locations.len() >= STALKING_MIN_LOCATIONS {
        score += 0.4;
        reasons.push(format!("Follows across {} locations", device.locations.len()));
    }
    if device.appearances >= STALKING_MIN_APPEARANCES {
        score += 0.3;
        reasons.push(format!("High frequency ({} appearances)", device.appearances));
    }
    let span = device.span_hours();
    if span >= STALKING_MIN_SPAN_HOURS {
        score += 0.3;
        reasons.push(format!("Persistent over {:.1} days", span / 24.0));
    }

    (score >= STALKING_MIN_SCORE).then(|| StalkingAssessment { mac: device.mac.clone(), score, reasons })
}
