//! Window bucket set - aged identity bands
//!
//! Four MAC bands and four SSID bands, newest first. Contents are filtered
//! against the ignore lists before they are stored.
//!
//! Both `initialize` and `rotate` complete every source query before touching
//! any band, so a failed query leaves the caller with either no bucket set
//! (initialize) or the previous one unchanged (rotate).

use crate::domain::{Band, MacAddress, SourceError, Ssid, TimeRange, TimeWindows};
use crate::io::source::{probes_from, SightingSource};
use crate::services::filter::IgnoreFilter;
use chrono::{DateTime, Utc};
use rustc_hash::FxHashSet;
use std::hash::Hash;
use tracing::info;

/// One identity set per band, indexed by `Band::index()`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BandSet<T: Eq + Hash> {
    bands: [FxHashSet<T>; 4],
}

impl<T: Eq + Hash> Default for BandSet<T> {
    fn default() -> Self {
        Self { bands: Default::default() }
    }
}

impl<T: Eq + Hash> BandSet<T> {
    pub fn from_bands(bands: [FxHashSet<T>; 4]) -> Self {
        Self { bands }
    }

    pub fn get(&self, band: Band) -> &FxHashSet<T> {
        &self.bands[band.index()]
    }

    #[inline]
    pub fn contains(&self, band: Band, item: &T) -> bool {
        self.bands[band.index()].contains(item)
    }

    /// Historical bands holding `item`, oldest last
    pub fn historical_matches<'a>(&'a self, item: &'a T) -> impl Iterator<Item = Band> + 'a {
        Band::HISTORICAL.into_iter().filter(move |band| self.contains(*band, item))
    }

    pub fn counts(&self) -> [usize; 4] {
        [self.bands[0].len(), self.bands[1].len(), self.bands[2].len(), self.bands[3].len()]
    }

    /// Age every band by one step: the oldest is dropped, `fresh` becomes newest
    fn push_newest(&mut self, fresh: FxHashSet<T>) {
        self.bands.rotate_right(1);
        self.bands[0] = fresh;
    }
}

/// Band sizes after a rotation or rebuild
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationStats {
    pub macs: [usize; 4],
    pub ssids: [usize; 4],
}

impl RotationStats {
    pub fn log(&self, action: &'static str) {
        let [mr, mm, mo, mx] = self.macs;
        let [sr, sm, so, sx] = self.ssids;
        info!(
            action = %action,
            macs_recent = %mr,
            macs_medium = %mm,
            macs_old = %mo,
            macs_oldest = %mx,
            ssids_recent = %sr,
            ssids_medium = %sm,
            ssids_old = %so,
            ssids_oldest = %sx,
            "window_bands"
        );
    }
}

/// The MAC and SSID band sets, owned by the monitor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowBuckets {
    macs: BandSet<MacAddress>,
    ssids: BandSet<Ssid>,
}

impl WindowBuckets {
    /// Populate all eight bands from the source as of `now`
    pub fn initialize<S: SightingSource + ?Sized>(
        source: &S,
        now: DateTime<Utc>,
        windows: &TimeWindows,
        filter: &IgnoreFilter,
    ) -> Result<Self, SourceError> {
        let boundaries = windows.boundaries(now);
        let mut macs: [FxHashSet<MacAddress>; 4] = Default::default();
        let mut ssids: [FxHashSet<Ssid>; 4] = Default::default();

        for band in Band::ALL {
            let (band_macs, band_ssids) = fetch_band(source, boundaries.range(band), filter)?;
            macs[band.index()] = band_macs;
            ssids[band.index()] = band_ssids;
        }

        let buckets = Self { macs: BandSet::from_bands(macs), ssids: BandSet::from_bands(ssids) };
        buckets.stats().log("initialized");
        Ok(buckets)
    }

    /// Age all bands by one step and fetch a fresh newest band.
    ///
    /// On error nothing has been modified.
    pub fn rotate<S: SightingSource + ?Sized>(
        &mut self,
        source: &S,
        now: DateTime<Utc>,
        windows: &TimeWindows,
        filter: &IgnoreFilter,
    ) -> Result<RotationStats, SourceError> {
        let range = windows.boundaries(now).range(Band::Recent);
        let (fresh_macs, fresh_ssids) = fetch_band(source, range, filter)?;

        self.macs.push_newest(fresh_macs);
        self.ssids.push_newest(fresh_ssids);

        let stats = self.stats();
        stats.log("rotated");
        Ok(stats)
    }

    pub fn macs(&self) -> &BandSet<MacAddress> {
        &self.macs
    }

    pub fn ssids(&self) -> &BandSet<Ssid> {
        &self.ssids
    }

    pub fn stats(&self) -> RotationStats {
        RotationStats { macs: self.macs.counts(), ssids: self.ssids.counts() }
    }
}

/// Filtered MACs and probed SSIDs for one band range
fn fetch_band<S: SightingSource + ?Sized>(
    source: &S,
    range: TimeRange,
    filter: &IgnoreFilter,
) -> Result<(FxHashSet<MacAddress>, FxHashSet<Ssid>), SourceError> {
    let devices = source.devices_between(range)?;
    let probes = probes_from(&devices);

    let macs = filter.filter_macs(devices.iter().map(|s| &s.mac));
    let ssids = filter.filter_ssids(probes.iter().map(|p| &p.ssid));
    Ok((macs, ssids))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Sighting;
    use crate::io::memory::MemorySource;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
    }

    fn mac(raw: &str) -> MacAddress {
        MacAddress::parse(raw).unwrap()
    }

    fn ssid(raw: &str) -> Ssid {
        Ssid::parse(raw).unwrap()
    }

    fn seeded() -> MemorySource {
        let source = MemorySource::new();
        let at = |minutes: i64| now() - Duration::minutes(minutes);
        source.push(Sighting::new(mac("00:00:00:00:00:01"), at(1)));
        source.push(Sighting::new(mac("00:00:00:00:00:02"), at(7)).with_probe("FreeWiFi"));
        source.push(Sighting::new(mac("00:00:00:00:00:03"), at(12)));
        source.push(Sighting::new(mac("00:00:00:00:00:04"), at(17)).with_probe("CorpWiFi"));
        source.push(Sighting::new(mac("AA:BB:CC:DD:EE:FF"), at(8)).with_probe("HomeNet"));
        source.push(Sighting::new(mac("00:00:00:00:00:05"), at(25)));
        source
    }

    fn filter() -> IgnoreFilter {
        IgnoreFilter::new([mac("AA:BB:CC:DD:EE:FF")], [ssid("HomeNet")])
    }

    #[test]
    fn test_initialize_places_identities_by_age() {
        let buckets =
            WindowBuckets::initialize(&seeded(), now(), &TimeWindows::default(), &filter()).unwrap();

        assert!(buckets.macs().contains(Band::Recent, &mac("00:00:00:00:00:01")));
        assert!(buckets.macs().contains(Band::Medium, &mac("00:00:00:00:00:02")));
        assert!(buckets.macs().contains(Band::Old, &mac("00:00:00:00:00:03")));
        assert!(buckets.macs().contains(Band::Oldest, &mac("00:00:00:00:00:04")));
        assert!(buckets.ssids().contains(Band::Medium, &ssid("FreeWiFi")));
        assert!(buckets.ssids().contains(Band::Oldest, &ssid("CorpWiFi")));

        // 00:00:00:00:00:05 is older than the oldest band
        assert_eq!(buckets.stats().macs, [1, 1, 1, 1]);
    }

    #[test]
    fn test_ignored_identities_never_stored() {
        let buckets =
            WindowBuckets::initialize(&seeded(), now(), &TimeWindows::default(), &filter()).unwrap();
        for band in Band::ALL {
            assert!(!buckets.macs().contains(band, &mac("AA:BB:CC:DD:EE:FF")));
            assert!(!buckets.ssids().contains(band, &ssid("HomeNet")));
        }
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let windows = TimeWindows::default();
        let a = WindowBuckets::initialize(&seeded(), now(), &windows, &filter()).unwrap();
        let b = WindowBuckets::initialize(&seeded(), now(), &windows, &filter()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_initialize_fails_when_source_offline() {
        let source = seeded();
        source.set_offline(true);
        let result = WindowBuckets::initialize(&source, now(), &TimeWindows::default(), &filter());
        assert!(result.is_err());
    }

    #[test]
    fn test_rotate_shifts_bands_and_fetches_newest() {
        let windows = TimeWindows::default();
        let source = seeded();
        let mut buckets = WindowBuckets::initialize(&source, now(), &windows, &filter()).unwrap();
        let before = buckets.clone();

        let later = now() + Duration::minutes(5);
        source.push(Sighting::new(mac("00:00:00:00:00:09"), later - Duration::minutes(1)));
        buckets.rotate(&source, later, &windows, &filter()).unwrap();

        assert_eq!(buckets.macs().get(Band::Medium), before.macs().get(Band::Recent));
        assert_eq!(buckets.macs().get(Band::Old), before.macs().get(Band::Medium));
        assert_eq!(buckets.macs().get(Band::Oldest), before.macs().get(Band::Old));
        assert_eq!(buckets.ssids().get(Band::Oldest), before.ssids().get(Band::Old));
        assert!(buckets.macs().contains(Band::Recent, &mac("00:00:00:00:00:09")));
        assert!(!buckets.macs().contains(Band::Oldest, &mac("00:00:00:00:00:04")));
    }

    #[test]
    fn test_failed_rotation_leaves_buckets_unchanged() {
        let windows = TimeWindows::default();
        let source = seeded();
        let mut buckets = WindowBuckets::initialize(&source, now(), &windows, &filter()).unwrap();
        let before = buckets.clone();

        source.set_offline(true);
        assert!(buckets.rotate(&source, now() + Duration::minutes(5), &windows, &filter()).is_err());
        assert_eq!(buckets, before);
    }

    #[test]
    fn test_four_rotations_drain_history() {
        let windows = TimeWindows::default();
        let source = seeded();
        let mut buckets = WindowBuckets::initialize(&source, now(), &windows, &filter()).unwrap();

        source.clear();
        for step in 1..=4 {
            let at = now() + Duration::minutes(5 * step);
            buckets.rotate(&source, at, &windows, &filter()).unwrap();
        }

        assert_eq!(buckets.stats().macs, [0, 0, 0, 0]);
        assert_eq!(buckets.stats().ssids, [0, 0, 0, 0]);
    }

    /// Counts device queries against an inner source
    struct CountingSource {
        inner: MemorySource,
        queries: std::cell::Cell<usize>,
    }

    impl SightingSource for CountingSource {
        fn devices_between(&self, range: TimeRange) -> Result<crate::domain::Sightings<Sighting>, SourceError> {
            self.queries.set(self.queries.get() + 1);
            self.inner.devices_between(range)
        }
    }

    #[test]
    fn test_one_query_per_band() {
        let windows = TimeWindows::default();
        let source = CountingSource { inner: seeded(), queries: std::cell::Cell::new(0) };

        let mut buckets = WindowBuckets::initialize(&source, now(), &windows, &filter()).unwrap();
        assert_eq!(source.queries.get(), 4);
        assert!(buckets.ssids().contains(Band::Medium, &ssid("FreeWiFi")));

        buckets.rotate(&source, now() + Duration::minutes(5), &windows, &filter()).unwrap();
        assert_eq!(source.queries.get(), 5);
    }

    #[test]
    fn test_historical_matches_excludes_recent() {
        let mut macs: [FxHashSet<MacAddress>; 4] = Default::default();
        for set in macs.iter_mut() {
            set.insert(mac("11:22:33:44:55:66"));
        }
        let bands = BandSet::from_bands(macs);
        let hits: Vec<Band> = bands.historical_matches(&mac("11:22:33:44:55:66")).collect();
        assert_eq!(hits, vec![Band::Medium, Band::Old, Band::Oldest]);
    }
}
