//! Infrastructure - configuration, metrics, and logging
//!
//! This module contains infrastructure concerns:
//! - `config` - Application configuration (TOML loading, defaults)
//! - `metrics` - Lock-free monitor counters
//! - `logging` - Tracing subscriber setup (stderr and run log file)
//! - `shutdown` - Ctrl-C and SIGTERM listener

pub mod config;
pub mod logging;
pub mod metrics;
pub mod shutdown;

// Re-export commonly used types
pub use config::{AnalysisConfig, BoundingBox, Config, RotationMode, SourceKind, WigleConfig};
pub use metrics::{Metrics, MetricsSummary};
