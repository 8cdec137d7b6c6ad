//! Lock-free monitor counters and periodic summary
//!
//! NOTE: All atomics use Relaxed ordering intentionally; these are statistical
//! counters only. Do NOT use them for coordination or logic decisions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Lock-free metrics collector
pub struct Metrics {
    cycles: AtomicU64,
    cycles_skipped: AtomicU64,
    sightings_processed: AtomicU64,
    sightings_skipped: AtomicU64,
    probe_events: AtomicU64,
    detection_events: AtomicU64,
    rotations: AtomicU64,
    rebuilds: AtomicU64,
    rotation_failures: AtomicU64,
    started: Instant,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            cycles: AtomicU64::new(0),
            cycles_skipped: AtomicU64::new(0),
            sightings_processed: AtomicU64::new(0),
            sightings_skipped: AtomicU64::new(0),
            probe_events: AtomicU64::new(0),
            detection_events: AtomicU64::new(0),
            rotations: AtomicU64::new(0),
            rebuilds: AtomicU64::new(0),
            rotation_failures: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    #[inline]
    pub fn record_cycle(&self) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_cycle_skipped(&self) {
        self.cycles_skipped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_sightings(&self, processed: u64, skipped: u64) {
        self.sightings_processed.fetch_add(processed, Ordering::Relaxed);
        self.sightings_skipped.fetch_add(skipped, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_events(&self, probes: u64, detections: u64) {
        self.probe_events.fetch_add(probes, Ordering::Relaxed);
        self.detection_events.fetch_add(detections, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_rotation(&self) {
        self.rotations.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_rebuild(&self) {
        self.rebuilds.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_rotation_failure(&self) {
        self.rotation_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    pub fn rotation_failures(&self) -> u64 {
        self.rotation_failures.load(Ordering::Relaxed)
    }

    /// Snapshot of all counters (monotonic, never reset)
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            uptime_secs: self.started.elapsed().as_secs(),
            cycles: self.cycles.load(Ordering::Relaxed),
            cycles_skipped: self.cycles_skipped.load(Ordering::Relaxed),
            sightings_processed: self.sightings_processed.load(Ordering::Relaxed),
            sightings_skipped: self.sightings_skipped.load(Ordering::Relaxed),
            probe_events: self.probe_events.load(Ordering::Relaxed),
            detection_events: self.detection_events.load(Ordering::Relaxed),
            rotations: self.rotations.load(Ordering::Relaxed),
            rebuilds: self.rebuilds.load(Ordering::Relaxed),
            rotation_failures: self.rotation_failures.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSummary {
    pub uptime_secs: u64,
    pub cycles: u64,
    pub cycles_skipped: u64,
    pub sightings_processed: u64,
    pub sightings_skipped: u64,
    pub probe_events: u64,
    pub detection_events: u64,
    pub rotations: u64,
    pub rebuilds: u64,
    pub rotation_failures: u64,
}

impl MetricsSummary {
    pub fn log(&self) {
        info!(
            uptime_secs = %self.uptime_secs,
            cycles = %self.cycles,
            cycles_skipped = %self.cycles_skipped,
            sightings = %self.sightings_processed,
            sightings_skipped = %self.sightings_skipped,
            probes = %self.probe_events,
            detections = %self.detection_events,
            rotations = %self.rotations,
            rebuilds = %self.rebuilds,
            rotation_failures = %self.rotation_failures,
            "metrics"
        );
    }
}
