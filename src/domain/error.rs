//! Error taxonomy for the tracking engine
//!
//! Per-row and per-identity faults (`IdentityError`, `SightingError`) are
//! always recovered locally: the row is skipped and logged. `SourceError` skips
//! a cycle. Only `MonitorError::Initialization` is fatal.

use thiserror::Error;

/// An identity failed format validation (InvalidIdentity)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("invalid MAC address {0:?}")]
    InvalidMac(String),
    #[error("invalid SSID {ssid:?}: {reason}")]
    InvalidSsid { ssid: String, reason: String },
}

/// A single sighting could not be interpreted (MalformedSighting)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SightingError {
    #[error("malformed metadata for {mac}: {reason}")]
    Malformed { mac: String, reason: String },
    #[error("probe from {mac} rejected: {source}")]
    InvalidProbe {
        mac: String,
        #[source]
        source: IdentityError,
    },
}

/// The sighting store could not be reached or queried (SourceUnavailable)
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("sighting source unavailable: {0}")]
    Unavailable(String),
    #[error("sighting query failed: {0}")]
    Query(String),
}

/// Failures surfaced by the monitor to its caller
#[derive(Debug, Error)]
pub enum MonitorError {
    /// The bucket set could not be populated at startup
    #[error("failed to initialize tracking windows: {0}")]
    Initialization(#[source] SourceError),
    /// A rotation query failed; the previous bucket set is kept unchanged
    #[error("failed to rotate tracking windows: {0}")]
    Rotation(#[source] SourceError),
    #[error("event log write failed: {0}")]
    EventLog(#[from] std::io::Error),
}
