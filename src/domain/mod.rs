//! Domain models - identities, sightings, time bands and events
//!
//! This module contains the canonical data types used throughout the system:
//! - `MacAddress` / `Ssid` - validated identities tracked across bands
//! - `Sighting` - a raw device observation from the capture backend
//! - `Band` / `TimeWindows` - age bands and their boundaries
//! - `Event` - records written to the event log
//! - `error` - the failure taxonomy shared by all layers

pub mod error;
pub mod event;
pub mod identity;
pub mod sighting;
pub mod window;

// Re-export commonly used types at module level
pub use error::{IdentityError, MonitorError, SightingError, SourceError};
pub use event::{Event, EventKind};
pub use identity::{MacAddress, Ssid};
pub use sighting::{ProbeSighting, Sighting, Sightings};
pub use window::{Band, TimeRange, TimeWindows, WindowBoundaries};
