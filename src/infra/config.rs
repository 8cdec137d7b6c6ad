//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> command line argument
//! 2. Default: config/tailwatch.toml
//!
//! A missing file falls back to defaults. A file that exists but cannot be
//! parsed, or holds invalid values, is an error.

use crate::domain::window::TimeWindows;
use anyhow::{bail, Context};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Marker stored as `config_file` when no file was read
const DEFAULTS_MARKER: &str = "default";

/// How rotation of the band set is scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationMode {
    /// Rotate once per band width of elapsed wall-clock time
    WallClock,
    /// Rotate every `list_update_interval` poll cycles
    Cycles,
}

/// Backing store for sightings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Kismet SQLite capture log
    Kismet,
    /// JSONL file of recorded sightings
    Replay,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimingConfig {
    /// Seconds between poll cycles
    #[serde(default = "default_check_interval")]
    pub check_interval: u64,
    /// Poll cycles between rotations (cycle-driven rotation only)
    #[serde(default = "default_list_update_interval")]
    pub list_update_interval: u64,
    #[serde(default = "default_rotation")]
    pub rotation: RotationMode,
    /// Bound on source connection and query time
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,
    #[serde(default)]
    pub time_windows: TimeWindows,
}

fn default_check_interval() -> u64 {
    60
}

fn default_list_update_interval() -> u64 {
    5
}

fn default_rotation() -> RotationMode {
    RotationMode::WallClock
}

fn default_query_timeout_secs() -> u64 {
    30
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            check_interval: default_check_interval(),
            list_update_interval: default_list_update_interval(),
            rotation: default_rotation(),
            query_timeout_secs: default_query_timeout_secs(),
            time_windows: TimeWindows::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_source_kind")]
    pub kind: SourceKind,
    /// Directory searched for the newest `*.kismet` file, or a capture file
    #[serde(default = "default_kismet_logs")]
    pub kismet_logs: String,
    /// Recorded sightings for replay mode (JSONL)
    #[serde(default = "default_replay_file")]
    pub replay_file: String,
}

fn default_source_kind() -> SourceKind {
    SourceKind::Kismet
}

fn default_kismet_logs() -> String {
    "kismet_logs".to_string()
}

fn default_replay_file() -> String {
    "sightings.jsonl".to_string()
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: default_source_kind(),
            kismet_logs: default_kismet_logs(),
            replay_file: default_replay_file(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    /// Append-only event log (JSONL)
    #[serde(default = "default_event_log")]
    pub event_log: String,
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_event_log() -> String {
    "logs/events.jsonl".to_string()
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self { log_dir: default_log_dir(), event_log: default_event_log() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IgnoreListsConfig {
    #[serde(default = "default_mac_list")]
    pub mac: String,
    #[serde(default = "default_ssid_list")]
    pub ssid: String,
}

fn default_mac_list() -> String {
    "ignore_lists/mac_list.json".to_string()
}

fn default_ssid_list() -> String {
    "ignore_lists/ssid_list.json".to_string()
}

impl Default for IgnoreListsConfig {
    fn default() -> Self {
        Self { mac: default_mac_list(), ssid: default_ssid_list() }
    }
}

/// WiGLE network search credentials and area
#[derive(Debug, Clone, Deserialize)]
pub struct WigleConfig {
    /// API name; when empty `api_token` is sent as an already encoded token
    #[serde(default)]
    pub api_name: String,
    #[serde(default)]
    pub api_token: String,
    #[serde(default = "default_wigle_base_url")]
    pub base_url: String,
    #[serde(default = "default_wigle_timeout_secs")]
    pub timeout_secs: u64,
    /// Bounding box for local searches, used only when all four are set
    pub lat_min: Option<f64>,
    pub lat_max: Option<f64>,
    pub lon_min: Option<f64>,
    pub lon_max: Option<f64>,
}

fn default_wigle_base_url() -> String {
    "https://api.wigle.net".to_string()
}

fn default_wigle_timeout_secs() -> u64 {
    15
}

impl Default for WigleConfig {
    fn default() -> Self {
        Self {
            api_name: String::new(),
            api_token: String::new(),
            base_url: default_wigle_base_url(),
            timeout_secs: default_wigle_timeout_secs(),
            lat_min: None,
            lat_max: None,
            lon_min: None,
            lon_max: None,
        }
    }
}

/// Search area in degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

impl WigleConfig {
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        Some(BoundingBox {
            lat_min: self.lat_min?,
            lat_max: self.lat_max?,
            lon_min: self.lon_min?,
            lon_max: self.lon_max?,
        })
    }

    pub fn has_credentials(&self) -> bool {
        !self.api_token.is_empty()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Thresholds for multi-capture persistence analysis
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_min_appearances")]
    pub min_appearances: usize,
    #[serde(default = "default_min_span_hours")]
    pub min_span_hours: f64,
    /// Devices scoring strictly above this are reported
    #[serde(default = "default_min_score")]
    pub min_score: f64,
    /// Persistence score a device needs before stalking indicators are checked
    #[serde(default = "default_stalking_min_score")]
    pub stalking_min_score: f64,
    /// Captures modified within this many hours are analyzed by default
    #[serde(default = "default_window_hours")]
    pub window_hours: u64,
}

fn default_min_appearances() -> usize {
    3
}

fn default_min_span_hours() -> f64 {
    1.0
}

fn default_min_score() -> f64 {
    0.5
}

fn default_stalking_min_score() -> f64 {
    0.7
}

fn default_window_hours() -> u64 {
    24
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            min_appearances: default_min_appearances(),
            min_span_hours: default_min_span_hours(),
            min_score: default_min_score(),
            stalking_min_score: default_stalking_min_score(),
            window_hours: default_window_hours(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub ignore_lists: IgnoreListsConfig,
    #[serde(default)]
    pub wigle: WigleConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    check_interval_secs: u64,
    list_update_interval: u64,
    rotation: RotationMode,
    query_timeout_secs: u64,
    time_windows: TimeWindows,
    source_kind: SourceKind,
    kismet_logs: String,
    replay_file: String,
    log_dir: String,
    event_log: String,
    mac_list: String,
    ssid_list: String,
    wigle: WigleConfig,
    analysis: AnalysisConfig,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_toml(TomlConfig::default(), DEFAULTS_MARKER.to_string())
    }
}

impl Config {
    fn from_toml(toml_config: TomlConfig, config_file: String) -> Self {
        Self {
            check_interval_secs: toml_config.timing.check_interval,
            list_update_interval: toml_config.timing.list_update_interval,
            rotation: toml_config.timing.rotation,
            query_timeout_secs: toml_config.timing.query_timeout_secs,
            time_windows: toml_config.timing.time_windows,
            source_kind: toml_config.source.kind,
            kismet_logs: toml_config.source.kismet_logs,
            replay_file: toml_config.source.replay_file,
            log_dir: toml_config.paths.log_dir,
            event_log: toml_config.paths.event_log,
            mac_list: toml_config.ignore_lists.mac,
            ssid_list: toml_config.ignore_lists.ssid,
            wigle: toml_config.wigle,
            analysis: toml_config.analysis,
            config_file,
        }
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let toml_config: TomlConfig = toml::from_str(content).context("Failed to parse config")?;
        let config = Self::from_toml(toml_config, DEFAULTS_MARKER.to_string());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        let config = Self::from_toml(toml_config, path.display().to_string());
        config
            .validate()
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    /// Load configuration - uses the TOML file if present, defaults otherwise.
    ///
    /// Only a missing file falls back; read, parse and validation errors are
    /// returned. `is_default()` tells the caller which case happened.
    pub fn load_from_path(path: &str) -> anyhow::Result<Self> {
        if Path::new(path).exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.check_interval_secs == 0 {
            bail!("timing.check_interval must be greater than 0");
        }
        if self.list_update_interval == 0 {
            bail!("timing.list_update_interval must be greater than 0");
        }
        if self.query_timeout_secs == 0 {
            bail!("timing.query_timeout_secs must be greater than 0");
        }
        if let Err(reason) = self.time_windows.validate() {
            bail!("timing.time_windows: {reason}");
        }
        if self.wigle.timeout_secs == 0 {
            bail!("wigle.timeout_secs must be greater than 0");
        }
        if let Some(area) = self.wigle.bounding_box() {
            if area.lat_min > area.lat_max || area.lon_min > area.lon_max {
                bail!("wigle bounding box minimums must not exceed maximums");
            }
        }
        if self.analysis.min_appearances == 0 {
            bail!("analysis.min_appearances must be greater than 0");
        }
        if self.analysis.min_span_hours <= 0.0 {
            bail!("analysis.min_span_hours must be greater than 0");
        }
        if self.analysis.window_hours == 0 {
            bail!("analysis.window_hours must be greater than 0");
        }
        Ok(())
    }

    /// True when no config file was read
    pub fn is_default(&self) -> bool {
        self.config_file == DEFAULTS_MARKER
    }

    // Getters for all config fields
    pub fn check_interval_secs(&self) -> u64 {
        self.check_interval_secs
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn list_update_interval(&self) -> u64 {
        self.list_update_interval
    }

    pub fn rotation(&self) -> RotationMode {
        self.rotation
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    pub fn time_windows(&self) -> &TimeWindows {
        &self.time_windows
    }

    pub fn source_kind(&self) -> SourceKind {
        self.source_kind
    }

    pub fn kismet_logs(&self) -> &str {
        &self.kismet_logs
    }

    pub fn replay_file(&self) -> &str {
        &self.replay_file
    }

    pub fn log_dir(&self) -> &str {
        &self.log_dir
    }

    pub fn event_log(&self) -> &str {
        &self.event_log
    }

    pub fn mac_list(&self) -> &str {
        &self.mac_list
    }

    pub fn ssid_list(&self) -> &str {
        &self.ssid_list
    }

    pub fn wigle(&self) -> &WigleConfig {
        &self.wigle
    }

    pub fn analysis(&self) -> &AnalysisConfig {
        &self.analysis
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Builder method for tests to override band widths
    pub fn with_time_windows(mut self, windows: TimeWindows) -> Self {
        self.time_windows = windows;
        self
    }

    /// Builder method for tests to redirect the event log
    pub fn with_event_log(mut self, path: &str) -> Self {
        self.event_log = path.to_string();
        self
    }
}
