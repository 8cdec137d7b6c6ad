//! IO modules - external system interfaces
//!
//! This module contains all external IO operations:
//! - `source` - Sighting source and connector traits
//! - `kismet` - Kismet SQLite capture log source
//! - `memory` - In-memory / replay sighting source
//! - `ignore_list` - Operator ignore-list files (load and save)
//! - `event_log` - Event output to file (JSONL format)
//! - `wigle` - WiGLE SSID location lookups

pub mod event_log;
pub mod ignore_list;
pub mod kismet;
pub mod memory;
pub mod source;
pub mod wigle;

// Re-export commonly used types
pub use event_log::{read_event_log, EventLog, EventLogContents};
pub use ignore_list::IgnoreLists;
pub use kismet::{KismetConnector, KismetDb};
pub use memory::MemorySource;
pub use source::{probes_from, SightingSource, SourceConnector};
pub use wigle::{LookupError, WigleClient, WigleSummary};
