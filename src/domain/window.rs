//! Age bands and time boundaries
//!
//! History is split into four bands by age, measured in minutes from `now`:
//!
//! ```text
//!   oldest        old          medium        recent
//! [20m, 15m)   [15m, 10m)   [10m, 5m)     [5m, now ...)
//! ```
//!
//! Current activity is a narrower slice, `[now - 2m, ...)`, so a device must be
//! freshly active to be compared against the older bands.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Age band of a bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Band {
    Recent,
    Medium,
    Old,
    Oldest,
}

impl Band {
    /// All bands, newest first (also the storage order in a band set)
    pub const ALL: [Band; 4] = [Band::Recent, Band::Medium, Band::Old, Band::Oldest];

    /// Bands compared against current activity. The newest band is excluded
    /// because current activity is itself part of it.
    pub const HISTORICAL: [Band; 3] = [Band::Medium, Band::Old, Band::Oldest];

    #[inline]
    pub fn index(self) -> usize {
        match self {
            Band::Recent => 0,
            Band::Medium => 1,
            Band::Old => 2,
            Band::Oldest => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Band::Recent => "recent",
            Band::Medium => "medium",
            Band::Old => "old",
            Band::Oldest => "oldest",
        }
    }
}

impl std::fmt::Display for Band {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Band widths in minutes, as configured under `[timing.time_windows]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct TimeWindows {
    #[serde(default = "default_current")]
    pub current: u32,
    #[serde(default = "default_recent")]
    pub recent: u32,
    #[serde(default = "default_medium")]
    pub medium: u32,
    #[serde(default = "default_old")]
    pub old: u32,
    #[serde(default = "default_oldest")]
    pub oldest: u32,
}

fn default_current() -> u32 {
    2
}

fn default_recent() -> u32 {
    5
}

fn default_medium() -> u32 {
    10
}

fn default_old() -> u32 {
    15
}

fn default_oldest() -> u32 {
    20
}

impl Default for TimeWindows {
    fn default() -> Self {
        Self {
            current: default_current(),
            recent: default_recent(),
            medium: default_medium(),
            old: default_old(),
            oldest: default_oldest(),
        }
    }
}

impl TimeWindows {
    /// Check that bands are non-empty and strictly ordered by age
    pub fn validate(&self) -> Result<(), String> {
        if self.current == 0 {
            return Err("current window must be at least 1 minute".to_string());
        }
        if !(0 < self.recent
            && self.recent < self.medium
            && self.medium < self.old
            && self.old < self.oldest)
        {
            return Err(format!(
                "time windows must satisfy 0 < recent < medium < old < oldest (got {}/{}/{}/{})",
                self.recent, self.medium, self.old, self.oldest
            ));
        }
        Ok(())
    }

    /// Width of the newest band; rotation happens once per this duration
    pub fn band_width(&self) -> Duration {
        Duration::minutes(i64::from(self.recent))
    }

    /// Human-readable age label, e.g. `5-10 min`
    pub fn label(&self, band: Band) -> String {
        let (from, to) = match band {
            Band::Recent => (0, self.recent),
            Band::Medium => (self.recent, self.medium),
            Band::Old => (self.medium, self.old),
            Band::Oldest => (self.old, self.oldest),
        };
        format!("{from}-{to} min")
    }

    /// Timestamp boundaries for a given instant
    pub fn boundaries(&self, now: DateTime<Utc>) -> WindowBoundaries {
        let ago = |minutes: u32| now - Duration::minutes(i64::from(minutes));
        WindowBoundaries {
            current: ago(self.current),
            recent: ago(self.recent),
            medium: ago(self.medium),
            old: ago(self.old),
            oldest: ago(self.oldest),
        }
    }
}

/// Half-open time interval `[start, end)`; `end = None` is open-ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
}

impl TimeRange {
    pub fn since(start: DateTime<Utc>) -> Self {
        Self { start, end: None }
    }

    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end: Some(end) }
    }

    /// Everything ever recorded
    pub fn all() -> Self {
        Self { start: DateTime::<Utc>::UNIX_EPOCH, end: None }
    }

    #[inline]
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && self.end.map_or(true, |end| ts < end)
    }
}

/// Absolute band boundaries computed from one `now`
#[derive(Debug, Clone, Copy)]
pub struct WindowBoundaries {
    pub current: DateTime<Utc>,
    pub recent: DateTime<Utc>,
    pub medium: DateTime<Utc>,
    pub old: DateTime<Utc>,
    pub oldest: DateTime<Utc>,
}

impl WindowBoundaries {
    /// Query range that populates a band
    pub fn range(&self, band: Band) -> TimeRange {
        match band {
            Band::Recent => TimeRange::since(self.recent),
            Band::Medium => TimeRange::between(self.medium, self.recent),
            Band::Old => TimeRange::between(self.old, self.medium),
            Band::Oldest => TimeRange::between(self.oldest, self.old),
        }
    }

    /// Query range for current activity
    pub fn current_range(&self) -> TimeRange {
        TimeRange::since(self.current)
    }
}
