//! Sighting source interface
//!
//! A source answers "which devices were last seen in `[start, end)`". Probe
//! sightings are derived from the same rows. A `SourceConnector` hands out a
//! fresh source per poll cycle; dropping the source closes it.

use crate::domain::{ProbeSighting, Sighting, SightingError, Sightings, SourceError, TimeRange};
use tracing::{debug, warn};

/// Read-only query interface over recorded sightings
pub trait SightingSource {
    /// Devices whose last sighting falls in `range`
    fn devices_between(&self, range: TimeRange) -> Result<Sightings<Sighting>, SourceError>;

    /// Probe requests whose device was last seen in `range`.
    ///
    /// Rows without a probe (or with an empty one) are not probe sightings.
    /// Malformed or invalid probe records are skipped per row.
    fn probes_between(&self, range: TimeRange) -> Result<Sightings<ProbeSighting>, SourceError> {
        let devices = self.devices_between(range)?;
        Ok(probes_from(&devices))
    }
}

/// Probe sightings carried by already-fetched device rows.
///
/// Lets a caller that needs both MACs and SSIDs for a range read the rows once.
pub fn probes_from(devices: &Sightings<Sighting>) -> Sightings<ProbeSighting> {
    let mut probes = Vec::with_capacity(devices.len());

    for sighting in devices.iter() {
        match sighting.probed_ssid() {
            Ok(Some(ssid)) if !ssid.is_empty() => probes.push(ProbeSighting {
                mac: sighting.mac.clone(),
                ssid,
                last_seen: sighting.last_seen,
            }),
            Ok(_) => {}
            Err(e @ SightingError::Malformed { .. }) => {
                debug!(mac = %sighting.mac, error = %e, "probe_record_skipped");
            }
            Err(e) => {
                warn!(mac = %sighting.mac, error = %e, "probe_rejected");
            }
        }
    }

    probes.into()
}

/// Opens a scoped source for one cycle
pub trait SourceConnector {
    type Source: SightingSource;

    fn connect(&self) -> Result<Self::Source, SourceError>;
}
