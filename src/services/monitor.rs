//! Monitor - the poll/rotate loop
//!
//! Each cycle, strictly sequential:
//! 1. open a source connection (dropped at the end of the cycle)
//! 2. run the current-activity pass and append its events to the log
//! 3. rotate the bands if a rotation is due
//!
//! A source failure skips the cycle; the band set is never partially updated.
//! Shutdown is checked between cycles only.

use crate::domain::{MonitorError, SourceError, TimeWindows};
use crate::infra::{Config, Metrics, RotationMode};
use crate::io::event_log::EventLog;
use crate::io::source::SourceConnector;
use crate::services::detector::Detector;
use crate::services::filter::IgnoreFilter;
use crate::services::windows::WindowBuckets;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

/// When the band set is aged forward
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationSchedule {
    /// Once per band width of elapsed time, with a rebuild after a stall
    WallClock,
    /// Every `every` poll cycles
    Cycles { every: u64 },
}

impl RotationSchedule {
    pub fn from_config(config: &Config) -> Self {
        match config.rotation() {
            RotationMode::WallClock => RotationSchedule::WallClock,
            RotationMode::Cycles => RotationSchedule::Cycles { every: config.list_update_interval() },
        }
    }
}

/// What happened to the band set in a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationOutcome {
    NotDue,
    Rotated,
    /// Rebuilt from scratch after a stall of two or more band widths
    Rebuilt,
    /// Query failed; bands left unchanged
    Failed,
}

/// Summary of a completed cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub cycle: u64,
    pub events_written: usize,
    pub rotation: RotationOutcome,
}

pub struct Monitor<C: SourceConnector> {
    connector: C,
    detector: Detector,
    buckets: WindowBuckets,
    event_log: EventLog,
    metrics: Arc<Metrics>,
    schedule: RotationSchedule,
    check_interval: Duration,
    cycle: u64,
    last_rotation: DateTime<Utc>,
}

impl<C: SourceConnector> Monitor<C> {
    /// Open the event log and populate the band set as of `now`.
    ///
    /// Fails with `MonitorError::Initialization` if the source cannot be
    /// reached or queried; the monitor must not run without a full band set.
    pub fn start(
        connector: C,
        config: &Config,
        filter: IgnoreFilter,
        metrics: Arc<Metrics>,
        now: DateTime<Utc>,
    ) -> Result<Self, MonitorError> {
        let event_log = EventLog::open(config.event_log())?;
        let windows = *config.time_windows();

        let buckets = {
            let source = connector.connect().map_err(MonitorError::Initialization)?;
            WindowBuckets::initialize(&source, now, &windows, &filter)
                .map_err(MonitorError::Initialization)?
        };

        let schedule = RotationSchedule::from_config(config);
        info!(
            ignored_macs = %filter.mac_count(),
            ignored_ssids = %filter.ssid_count(),
            check_interval_secs = %config.check_interval_secs(),
            schedule = ?schedule,
            "monitor_started"
        );

        Ok(Self {
            connector,
            detector: Detector::new(windows, filter),
            buckets,
            event_log,
            metrics,
            schedule,
            check_interval: config.check_interval(),
            cycle: 0,
            last_rotation: now,
        })
    }

    pub fn buckets(&self) -> &WindowBuckets {
        &self.buckets
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    fn windows(&self) -> &TimeWindows {
        self.detector.windows()
    }

    /// Run one poll cycle as of `now`.
    ///
    /// Returns the source error if the cycle was skipped.
    pub fn run_cycle(&mut self, now: DateTime<Utc>) -> Result<CycleReport, SourceError> {
        self.cycle += 1;
        let cycle = self.cycle;

        let source = match self.connector.connect() {
            Ok(source) => source,
            Err(e) => return Err(self.skip_cycle(cycle, e)),
        };

        let detection = match self.detector.process_current_activity(&source, now, &self.buckets) {
            Ok(detection) => detection,
            Err(e) => return Err(self.skip_cycle(cycle, e)),
        };

        let events_written = self.event_log.write_events(&detection.events);
        if events_written < detection.events.len() {
            error!(
                cycle = %cycle,
                lost = %(detection.events.len() - events_written),
                "events_not_written"
            );
        }

        self.metrics.record_cycle();
        self.metrics.record_sightings(detection.sightings as u64, detection.skipped as u64);
        self.metrics
            .record_events(detection.probe_count() as u64, detection.detection_count() as u64);

        let rotation = self.maybe_rotate(&source, cycle, now);

        Ok(CycleReport { cycle, events_written, rotation })
    }

    fn skip_cycle(&self, cycle: u64, e: SourceError) -> SourceError {
        error!(cycle = %cycle, error = %e, "cycle_skipped");
        self.metrics.record_cycle_skipped();
        e
    }

    fn maybe_rotate(&mut self, source: &C::Source, cycle: u64, now: DateTime<Utc>) -> RotationOutcome {
        let width = self.windows().band_width();
        let elapsed = now - self.last_rotation;

        let rebuild = match self.schedule {
            RotationSchedule::WallClock if elapsed >= width * 2 => true,
            RotationSchedule::WallClock if elapsed >= width => false,
            RotationSchedule::Cycles { every } if cycle % every == 0 => false,
            _ => return RotationOutcome::NotDue,
        };

        let windows = *self.windows();
        let filter = self.detector.filter();

        if rebuild {
            warn!(elapsed_secs = %elapsed.num_seconds(), "rotation_stalled_rebuilding");
            match WindowBuckets::initialize(source, now, &windows, filter) {
                Ok(fresh) => {
                    self.buckets = fresh;
                    self.last_rotation = now;
                    self.metrics.record_rebuild();
                    self.metrics.summary().log();
                    RotationOutcome::Rebuilt
                }
                Err(e) => self.rotation_failed(cycle, e),
            }
        } else {
            info!(cycle = %cycle, "rotating_windows");
            match self.buckets.rotate(source, now, &windows, filter) {
                Ok(_) => {
                    // Advance by whole band widths so cycle jitter does not accumulate
                    self.last_rotation = match self.schedule {
                        RotationSchedule::WallClock => self.last_rotation + width,
                        RotationSchedule::Cycles { .. } => now,
                    };
                    self.metrics.record_rotation();
                    self.metrics.summary().log();
                    RotationOutcome::Rotated
                }
                Err(e) => self.rotation_failed(cycle, e),
            }
        }
    }

    fn rotation_failed(&self, cycle: u64, e: SourceError) -> RotationOutcome {
        let err = MonitorError::Rotation(e);
        error!(cycle = %cycle, error = %err, "rotation_failed");
        self.metrics.record_rotation_failure();
        RotationOutcome::Failed
    }

    /// Poll until shutdown is signalled, then flush the event log.
    ///
    /// Cycles never overlap: a slow cycle delays the next tick. The shutdown
    /// signal is only observed between cycles.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.check_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(check_interval_secs = %self.check_interval.as_secs(), "monitor_loop_started");

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = interval.tick() => {
                    // Failures are logged inside; the loop continues either way
                    let _ = self.run_cycle(Utc::now());
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        if let Err(e) = self.event_log.flush() {
            error!(error = %e, "event_log_flush_failed");
        }
        self.metrics.summary().log();
        info!(cycles = %self.cycle, "monitor_stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Band, MacAddress, Sighting};
    use crate::infra::Config;
    use crate::io::event_log::read_event_log;
    use crate::io::memory::MemorySource;
    use chrono::{Duration as ChronoDuration, TimeZone};
    use tempfile::{tempdir, TempDir};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
    }

    fn mac(raw: &str) -> MacAddress {
        MacAddress::parse(raw).unwrap()
    }

    fn config(dir: &TempDir) -> Config {
        let path = dir.path().join("events.jsonl");
        Config::default().with_event_log(path.to_str().unwrap())
    }

    fn start(source: &MemorySource, config: &Config) -> Monitor<MemorySource> {
        Monitor::start(source.clone(), config, IgnoreFilter::default(), Arc::new(Metrics::new()), now())
            .unwrap()
    }

    #[test]
    fn test_start_fails_when_source_offline() {
        let dir = tempdir().unwrap();
        let source = MemorySource::new();
        source.set_offline(true);

        let result =
            Monitor::start(source, &config(&dir), IgnoreFilter::default(), Arc::new(Metrics::new()), now());
        assert!(matches!(result, Err(MonitorError::Initialization(_))));
    }

    #[test]
    fn test_cycle_writes_detection_events() {
        let dir = tempdir().unwrap();
        let config = config(&dir);
        let source = MemorySource::new();
        source.push(Sighting::new(mac("11:22:33:44:55:66"), now() - ChronoDuration::minutes(7)));

        let mut monitor = start(&source, &config);
        let at = now() + ChronoDuration::seconds(60);
        source.push(Sighting::new(mac("11:22:33:44:55:66"), at - ChronoDuration::seconds(30)));

        let report = monitor.run_cycle(at).unwrap();
        assert_eq!(report.events_written, 1);
        assert_eq!(report.rotation, RotationOutcome::NotDue);

        let contents = read_event_log(config.event_log()).unwrap();
        assert_eq!(contents.events.len(), 1);
        assert_eq!(contents.events[0].band(), Some(Band::Medium));
    }

    #[test]
    fn test_offline_cycle_skipped_and_buckets_kept() {
        let dir = tempdir().unwrap();
        let source = MemorySource::new();
        source.push(Sighting::new(mac("11:22:33:44:55:66"), now() - ChronoDuration::minutes(7)));
        let mut monitor = start(&source, &config(&dir));
        let before = monitor.buckets().clone();

        source.set_offline(true);
        assert!(monitor.run_cycle(now() + ChronoDuration::minutes(5)).is_err());
        assert_eq!(monitor.buckets(), &before);
        assert_eq!(monitor.metrics().summary().cycles_skipped, 1);

        source.set_offline(false);
        assert!(monitor.run_cycle(now() + ChronoDuration::minutes(6)).is_ok());
    }

    #[test]
    fn test_wall_clock_rotation_due_after_band_width() {
        let dir = tempdir().unwrap();
        let source = MemorySource::new();
        let mut monitor = start(&source, &config(&dir));

        for minute in 1..5 {
            let report = monitor.run_cycle(now() + ChronoDuration::minutes(minute)).unwrap();
            assert_eq!(report.rotation, RotationOutcome::NotDue);
        }
        // A late cycle rotates once...
        let report = monitor.run_cycle(now() + ChronoDuration::seconds(320)).unwrap();
        assert_eq!(report.rotation, RotationOutcome::Rotated);

        // ...and does not push the next rotation out by its lateness
        let report = monitor.run_cycle(now() + ChronoDuration::seconds(601)).unwrap();
        assert_eq!(report.rotation, RotationOutcome::Rotated);
        assert_eq!(monitor.metrics().summary().rotations, 2);
    }

    #[test]
    fn test_stall_triggers_rebuild() {
        let dir = tempdir().unwrap();
        let source = MemorySource::new();
        let mut monitor = start(&source, &config(&dir));

        let later = now() + ChronoDuration::minutes(12);
        source.push(Sighting::new(mac("11:22:33:44:55:66"), later - ChronoDuration::minutes(7)));

        let report = monitor.run_cycle(later).unwrap();
        assert_eq!(report.rotation, RotationOutcome::Rebuilt);
        assert!(monitor.buckets().macs().contains(Band::Medium, &mac("11:22:33:44:55:66")));
        assert_eq!(monitor.metrics().summary().rebuilds, 1);
    }

    #[test]
    fn test_cycle_schedule_rotates_every_nth_cycle() {
        let dir = tempdir().unwrap();
        let config = Config::from_toml_str("[timing]\nrotation = \"cycles\"\nlist_update_interval = 3\n")
            .unwrap()
            .with_event_log(dir.path().join("events.jsonl").to_str().unwrap());
        let source = MemorySource::new();
        let mut monitor = start(&source, &config);

        let outcomes: Vec<RotationOutcome> = (1..=6)
            .map(|i| monitor.run_cycle(now() + ChronoDuration::seconds(i)).unwrap().rotation)
            .collect();
        assert_eq!(
            outcomes,
            vec![
                RotationOutcome::NotDue,
                RotationOutcome::NotDue,
                RotationOutcome::Rotated,
                RotationOutcome::NotDue,
                RotationOutcome::NotDue,
                RotationOutcome::Rotated,
            ]
        );
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let dir = tempdir().unwrap();
        let config = config(&dir);
        let source = MemorySource::new();
        let mut monitor = start(&source, &config);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::join!(monitor.run(shutdown_rx), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            shutdown_tx.send(true).unwrap();
        });

        // First tick fires immediately; the next is a full interval away
        assert_eq!(monitor.cycle(), 1);
    }
}
