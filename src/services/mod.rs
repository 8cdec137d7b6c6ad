//! Services - tracking engine and orchestration
//!
//! This module contains the core logic:
//! - `filter` - Ignore-list filtering of MACs and SSIDs
//! - `windows` - Aged band sets and their rotation
//! - `detector` - Current-activity pass against historical bands
//! - `monitor` - Poll/rotate loop with graceful shutdown
//! - `report` - Offline aggregation of event logs
//! - `persistence` - Multi-capture persistence and stalking scores

pub mod detector;
pub mod filter;
pub mod monitor;
pub mod persistence;
pub mod report;
pub mod windows;

// Re-export commonly used types
pub use detector::{Detection, Detector};
pub use filter::IgnoreFilter;
pub use monitor::{CycleReport, Monitor, RotationOutcome, RotationSchedule};
pub use persistence::{
    persistence_score, Appearance, PersistenceAnalyzer, PersistenceThresholds, StalkingAssessment,
    SuspiciousDevice,
};
pub use report::{DetectionSummary, ProbeReport, SsidSummary};
pub use windows::{BandSet, RotationStats, WindowBuckets};
