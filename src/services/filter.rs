//! Ignore filter
//!
//! Removes operator-listed identities before they reach a band or trigger a
//! detection. MACs are already normalized to uppercase on construction, so
//! membership is effectively case-insensitive; SSIDs match byte-exact.

use crate::domain::{MacAddress, Ssid};
use rustc_hash::FxHashSet;

/// Immutable ignore sets, loaded once per process
#[derive(Debug, Clone, Default)]
pub struct IgnoreFilter {
    macs: FxHashSet<MacAddress>,
    ssids: FxHashSet<Ssid>,
}

impl IgnoreFilter {
    pub fn new<M, S>(macs: M, ssids: S) -> Self
    where
        M: IntoIterator<Item = MacAddress>,
        S: IntoIterator<Item = Ssid>,
    {
        Self { macs: macs.into_iter().collect(), ssids: ssids.into_iter().collect() }
    }

    #[inline]
    pub fn allows_mac(&self, mac: &MacAddress) -> bool {
        !self.macs.contains(mac)
    }

    /// Empty SSIDs (not probing) are never allowed
    #[inline]
    pub fn allows_ssid(&self, ssid: &Ssid) -> bool {
        !ssid.is_empty() && !self.ssids.contains(ssid)
    }

    pub fn filter_macs<'a, I>(&self, macs: I) -> FxHashSet<MacAddress>
    where
        I: IntoIterator<Item = &'a MacAddress>,
    {
        macs.into_iter().filter(|mac| self.allows_mac(mac)).cloned().collect()
    }

    pub fn filter_ssids<'a, I>(&self, ssids: I) -> FxHashSet<Ssid>
    where
        I: IntoIterator<Item = &'a Ssid>,
    {
        ssids.into_iter().filter(|ssid| self.allows_ssid(ssid)).cloned().collect()
    }

    pub fn mac_count(&self) -> usize {
        self.macs.len()
    }

    pub fn ssid_count(&self) -> usize {
        self.ssids.len()
    }
}
