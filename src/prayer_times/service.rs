//! Prayer-time resolution across the three cache tiers.
//!
//! A request for (date, location, method) is answered from the structured
//! store, then the file cache, then the network. Network failures fall back
//! to whatever complete set is stored nearby and flag the result as offline.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Weekday};
use log::{debug, info, warn};
use rusqlite::Connection;
use std::cell::Cell;
use std::path::PathBuf;
use std::thread::{self, JoinHandle};

use super::client::{decode_day, DayTimings, HttpClient, PrayerTimesSource};
use super::error::{PrayerTimeError, Result};
use super::file_cache::{cache_key, FileCache};
use super::methods::CalculationMethod;
use crate::config::settings::{LocationConfig, PrayerConfig};
use crate::config::{NetworkConfig, PrayerDurations};
use crate::db::repository::PrayerTimeRepo;
use crate::models::{PrayerKind, PrayerTime};
use crate::utils::geo::Coordinates;
use crate::utils::hijri::hijri_string;

/// Per-kind durations and buffers stamped onto fetched records.
#[derive(Debug, Clone)]
pub struct PrayerDefaults {
    pub durations: PrayerDurations,
    pub buffer_before: u32,
    pub buffer_after: u32,
}

impl PrayerDefaults {
    pub fn from_config(config: &PrayerConfig) -> Self {
        Self {
            durations: config.durations.clone(),
            buffer_before: config.buffer_before,
            buffer_after: config.buffer_after,
        }
    }
}

impl Default for PrayerDefaults {
    fn default() -> Self {
        Self::from_config(&PrayerConfig::default())
    }
}

/// Where a resolved day came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Store,
    FileCache,
    Network,
    /// Network failed; served from the best stored set instead.
    OfflineFallback,
}

#[derive(Debug, Clone)]
pub struct Resolved {
    pub times: Vec<PrayerTime>,
    pub origin: Origin,
}

impl Resolved {
    pub fn is_offline(&self) -> bool {
        self.origin == Origin::OfflineFallback
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrefetchReport {
    pub skipped: u32,
    pub fetched: u32,
    pub failed: u32,
}

pub struct PrayerTimeService<'a, S> {
    conn: &'a Connection,
    files: &'a FileCache,
    source: S,
    defaults: PrayerDefaults,
    offline: Cell<bool>,
}

impl<'a, S: PrayerTimesSource> PrayerTimeService<'a, S> {
    pub fn new(conn: &'a Connection, files: &'a FileCache, source: S, defaults: PrayerDefaults) -> Self {
        Self {
            conn,
            files,
            source,
            defaults,
            offline: Cell::new(false),
        }
    }

    /// True when the most recent resolution was served from the fallback
    /// after a network failure.
    pub fn is_offline(&self) -> bool {
        self.offline.get()
    }

    /// Five prayers for `date`, ordered by adhan.
    pub fn resolve(
        &self,
        date: NaiveDate,
        coords: Coordinates,
        method: CalculationMethod,
    ) -> Result<Resolved> {
        self.offline.set(false);
        let resolved = self.resolve_inner(date, coords, method)?;
        self.offline.set(resolved.is_offline());
        Ok(resolved)
    }

    fn resolve_inner(
        &self,
        date: NaiveDate,
        coords: Coordinates,
        method: CalculationMethod,
    ) -> Result<Resolved> {
        if let Some(times) = self.from_store(date, coords, method)? {
            debug!("store hit for {}", date);
            return Ok(Resolved {
                times,
                origin: Origin::Store,
            });
        }

        let key = cache_key(date, coords, method);
        if let Some(times) = self.from_file_cache(&key, date, coords, method)? {
            debug!("file cache hit for {}", key);
            return Ok(Resolved {
                times,
                origin: Origin::FileCache,
            });
        }

        match self.from_network(&key, date, coords, method) {
            Ok(times) => Ok(Resolved {
                times,
                origin: Origin::Network,
            }),
            Err(e) if e.is_transport() => {
                warn!("fetching prayer times for {} failed: {}", date, e);
                match self.fallback(date, coords, method)? {
                    Some(times) => {
                        info!("serving cached prayer times for {} while offline", date);
                        Ok(Resolved {
                            times,
                            origin: Origin::OfflineFallback,
                        })
                    }
                    None => Err(e),
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Exactly five rows is a hit; anything less is an incomplete entry.
    fn from_store(
        &self,
        date: NaiveDate,
        coords: Coordinates,
        method: CalculationMethod,
    ) -> Result<Option<Vec<PrayerTime>>> {
        let rows = PrayerTimeRepo::find_for_day(self.conn, date, coords, method)?;
        if rows.len() == 5 {
            Ok(Some(rows))
        } else {
            if !rows.is_empty() {
                debug!("incomplete store entry for {} ({} rows)", date, rows.len());
            }
            Ok(None)
        }
    }

    fn from_file_cache(
        &self,
        key: &str,
        date: NaiveDate,
        coords: Coordinates,
        method: CalculationMethod,
    ) -> Result<Option<Vec<PrayerTime>>> {
        let Some(blob) = self.files.load(key)? else {
            return Ok(None);
        };
        let timings = match decode_day(&blob) {
            Ok(t) => t,
            Err(e) => {
                warn!("dropping unreadable cache entry {}: {}", key, e);
                self.files.remove(key)?;
                return Ok(None);
            }
        };
        let times = build_day(date, coords, method, &timings, &self.defaults);
        let stored = PrayerTimeRepo::replace_for_day(self.conn, date, coords, method, &times)?;
        Ok(Some(stored))
    }

    fn from_network(
        &self,
        key: &str,
        date: NaiveDate,
        coords: Coordinates,
        method: CalculationMethod,
    ) -> Result<Vec<PrayerTime>> {
        info!("fetching prayer times for {} ({})", date, method);
        let body = self.source.fetch_day(date, coords, method)?;
        let timings = decode_day(body.as_bytes())?;

        if let Err(e) = self.files.save(key, body.as_bytes()) {
            warn!("could not write file cache entry {}: {}", key, e);
        }

        let times = build_day(date, coords, method, &timings, &self.defaults);
        let stored = PrayerTimeRepo::replace_for_day(self.conn, date, coords, method, &times)?;
        Ok(stored)
    }

    /// Re-check the store for the same cell; a concurrent prefetch may have
    /// filled it since the first lookup.
    fn fallback(
        &self,
        date: NaiveDate,
        coords: Coordinates,
        method: CalculationMethod,
    ) -> Result<Option<Vec<PrayerTime>>> {
        self.from_store(date, coords, method)
    }

    /// Warm the cache for `days` days from `start`. Days already in the store
    /// are skipped; individual failures are counted and the batch continues.
    /// `delay` spaces out requests that go to the source.
    pub fn prefetch(
        &self,
        start: NaiveDate,
        days: u32,
        coords: Coordinates,
        method: CalculationMethod,
        delay: std::time::Duration,
    ) -> PrefetchReport {
        let mut report = PrefetchReport::default();
        let mut first_request = true;

        for offset in 0..days {
            let date = start + Duration::days(offset as i64);

            match self.from_store(date, coords, method) {
                Ok(Some(_)) => {
                    report.skipped += 1;
                    continue;
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("prefetch: store lookup for {} failed: {}", date, e);
                    report.failed += 1;
                    continue;
                }
            }

            let key = cache_key(date, coords, method);
            match self.from_file_cache(&key, date, coords, method) {
                Ok(Some(_)) => {
                    debug!("prefetch: {} restored from file cache", date);
                    report.fetched += 1;
                    continue;
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("prefetch: file cache lookup for {} failed: {}", date, e);
                    report.failed += 1;
                    continue;
                }
            }

            if !first_request && !delay.is_zero() {
                thread::sleep(delay);
            }
            first_request = false;

            match self.resolve(date, coords, method) {
                Ok(r) if r.is_offline() => {
                    debug!("prefetch: {} only available from fallback", date);
                    report.failed += 1;
                }
                Ok(_) => report.fetched += 1,
                Err(e) => {
                    warn!("prefetch: {} failed: {}", date, e);
                    report.failed += 1;
                }
            }
        }

        info!(
            "prefetch done: {} fetched, {} already cached, {} failed",
            report.fetched, report.skipped, report.failed
        );
        report
    }
}

/// Turn one day's timings into the five records for that day. On Fridays
/// Dhuhr becomes Jumuah.
pub fn build_day(
    date: NaiveDate,
    coords: Coordinates,
    method: CalculationMethod,
    timings: &DayTimings,
    defaults: &PrayerDefaults,
) -> Vec<PrayerTime> {
    let c = coords.rounded();
    let hijri = timings.hijri.clone().or_else(|| hijri_string(date).ok());
    let friday = date.weekday() == Weekday::Fri;

    PrayerKind::daily()
        .into_iter()
        .map(|kind| {
            let kind = if friday && kind == PrayerKind::Dhuhr {
                PrayerKind::Jumuah
            } else {
                kind
            };
            PrayerTime {
                id: None,
                date,
                kind,
                adhan: date.and_time(timings.time_of(kind)),
                duration_minutes: defaults.durations.for_kind(kind),
                buffer_before: defaults.buffer_before,
                buffer_after: defaults.buffer_after,
                method,
                latitude: c.latitude,
                longitude: c.longitude,
                hijri: hijri.clone(),
            }
        })
        .collect()
}

/// First prayer whose adhan is still ahead of `now`.
pub fn next_prayer(times: &[PrayerTime], now: NaiveDateTime) -> Option<&PrayerTime> {
    times.iter().filter(|t| t.adhan > now).min_by_key(|t| t.adhan)
}

/// The prayer whose window (buffers included) contains `now`.
pub fn current_prayer(times: &[PrayerTime], now: NaiveDateTime) -> Option<&PrayerTime> {
    times.iter().find(|t| {
        let (start, end) = t.window();
        start <= now && now < end
    })
}

pub fn require_location(location: &LocationConfig) -> Result<Coordinates> {
    location
        .coordinates()
        .ok_or(PrayerTimeError::LocationUnknown)
}

// ─── Background prefetch ────────────────────────────────────────────────────

/// Everything a detached prefetch needs; it opens its own connection.
#[derive(Debug, Clone)]
pub struct PrefetchJob {
    pub db_path: PathBuf,
    pub cache_dir: PathBuf,
    pub network: NetworkConfig,
    pub defaults: PrayerDefaults,
    pub start: NaiveDate,
    pub days: u32,
    pub coords: Coordinates,
    pub method: CalculationMethod,
}

impl PrefetchJob {
    pub fn run(&self) -> Result<PrefetchReport> {
        let conn = Connection::open(&self.db_path)?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        let files = FileCache::open(&self.cache_dir)?;
        let client = HttpClient::new(&self.network)?;
        let service = PrayerTimeService::new(&conn, &files, client, self.defaults.clone());
        Ok(service.prefetch(
            self.start,
            self.days,
            self.coords,
            self.method,
            std::time::Duration::from_millis(self.network.request_delay_ms),
        ))
    }
}

/// Run a prefetch on a background thread. Errors are logged, never returned.
pub fn spawn_prefetch(job: PrefetchJob) -> JoinHandle<()> {
    thread::spawn(move || {
        if let Err(e) = job.run() {
            warn!("background prefetch failed: {}", e);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::run_migrations;
    use crate::prayer_times::client::tests::SAMPLE_BODY;
    use chrono::NaiveTime;
    use tempfile::{tempdir, TempDir};

    /// In-process source: counts calls, can be switched to failing or to
    /// returning garbage.
    struct FakeSource {
        calls: Cell<u32>,
        fail: Cell<bool>,
        body: String,
    }

    impl FakeSource {
        fn ok() -> Self {
            Self {
                calls: Cell::new(0),
                fail: Cell::new(false),
                body: SAMPLE_BODY.to_string(),
            }
        }

        fn with_body(body: &str) -> Self {
            Self {
                body: body.to_string(),
                ..Self::ok()
            }
        }
    }

    impl PrayerTimesSource for FakeSource {
        fn fetch_day(&self, _: NaiveDate, _: Coordinates, _: CalculationMethod) -> Result<String> {
            self.calls.set(self.calls.get() + 1);
            if self.fail.get() {
                let e = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "offline");
                return Err(PrayerTimeError::Network(Box::new(e)));
            }
            Ok(self.body.clone())
        }
    }

    struct Fixture {
        conn: Connection,
        files: FileCache,
        _dir: TempDir,
    }

    fn fixture() -> Fixture {
        let dir = tempdir().unwrap();
        let conn = Connection::open(dir.path().join("test.db")).unwrap();
        run_migrations(&conn).unwrap();
        let files = FileCache::open(dir.path().join("cache")).unwrap();
        Fixture {
            conn,
            files,
            _dir: dir,
        }
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn islamabad() -> Coordinates {
        Coordinates::new(33.6938, 73.0651)
    }

    const METHOD: CalculationMethod = CalculationMethod::Karachi;

    #[test]
    fn test_second_resolve_hits_store_without_network() {
        let fx = fixture();
        let source = FakeSource::ok();
        let svc = PrayerTimeService::new(&fx.conn, &fx.files, &source, PrayerDefaults::default());

        let first = svc.resolve(monday(), islamabad(), METHOD).unwrap();
        assert_eq!(first.origin, Origin::Network);
        let second = svc.resolve(monday(), islamabad(), METHOD).unwrap();
        assert_eq!(second.origin, Origin::Store);

        assert_eq!(source.calls.get(), 1);
        assert_eq!(first.times, second.times);
    }

    #[test]
    fn test_resolved_rows_are_five_sorted_by_adhan() {
        let fx = fixture();
        let source = FakeSource::ok();
        let svc = PrayerTimeService::new(&fx.conn, &fx.files, &source, PrayerDefaults::default());

        svc.resolve(monday(), islamabad(), METHOD).unwrap();
        let again = svc.resolve(monday(), islamabad(), METHOD).unwrap();
        assert_eq!(again.times.len(), 5);
        assert!(again.times.windows(2).all(|w| w[0].adhan < w[1].adhan));
        assert_eq!(again.times[0].kind, PrayerKind::Fajr);
        assert_eq!(again.times[0].adhan.time(), NaiveTime::from_hms_opt(5, 26, 0).unwrap());
        assert_eq!(again.times[0].latitude, 33.7);
        assert_eq!(again.times[0].hijri.as_deref(), Some("19 Jumādá al-ākhirah 1445"));
    }

    #[test]
    fn test_network_result_is_written_to_file_cache() {
        let fx = fixture();
        let source = FakeSource::ok();
        let svc = PrayerTimeService::new(&fx.conn, &fx.files, &source, PrayerDefaults::default());
        svc.resolve(monday(), islamabad(), METHOD).unwrap();

        let key = cache_key(monday(), islamabad(), METHOD);
        assert_eq!(
            fx.files.load(&key).unwrap().as_deref(),
            Some(SAMPLE_BODY.as_bytes())
        );
    }

    #[test]
    fn test_file_cache_hit_populates_store() {
        let fx = fixture();
        let key = cache_key(monday(), islamabad(), METHOD);
        fx.files.save(&key, SAMPLE_BODY.as_bytes()).unwrap();

        let source = FakeSource::ok();
        let svc = PrayerTimeService::new(&fx.conn, &fx.files, &source, PrayerDefaults::default());
        let r = svc.resolve(monday(), islamabad(), METHOD).unwrap();
        assert_eq!(r.origin, Origin::FileCache);
        assert_eq!(source.calls.get(), 0);

        let next = svc.resolve(monday(), islamabad(), METHOD).unwrap();
        assert_eq!(next.origin, Origin::Store);
    }

    #[test]
    fn test_corrupt_file_cache_entry_falls_through_to_network() {
        let fx = fixture();
        let key = cache_key(monday(), islamabad(), METHOD);
        fx.files.save(&key, b"not json").unwrap();

        let source = FakeSource::ok();
        let svc = PrayerTimeService::new(&fx.conn, &fx.files, &source, PrayerDefaults::default());
        let r = svc.resolve(monday(), islamabad(), METHOD).unwrap();
        assert_eq!(r.origin, Origin::Network);
        assert_eq!(source.calls.get(), 1);
    }

    #[test]
    fn test_incomplete_store_entry_is_a_miss() {
        let fx = fixture();
        let timings = decode_day(SAMPLE_BODY.as_bytes()).unwrap();
        let mut partial = build_day(monday(), islamabad(), METHOD, &timings, &PrayerDefaults::default());
        partial.truncate(4);
        PrayerTimeRepo::replace_for_day(&fx.conn, monday(), islamabad(), METHOD, &partial).unwrap();

        let source = FakeSource::ok();
        let svc = PrayerTimeService::new(&fx.conn, &fx.files, &source, PrayerDefaults::default());
        let r = svc.resolve(monday(), islamabad(), METHOD).unwrap();
        assert_eq!(r.origin, Origin::Network);
        assert_eq!(
            PrayerTimeRepo::find_for_day(&fx.conn, monday(), islamabad(), METHOD)
                .unwrap()
                .len(),
            5
        );
    }

    /// Fails every request. When `fill` is set it first stores the day, the
    /// way a background prefetch finishing mid-request would.
    struct RacingSource<'c> {
        conn: &'c Connection,
        fill: Cell<bool>,
    }

    impl PrayerTimesSource for RacingSource<'_> {
        fn fetch_day(&self, date: NaiveDate, coords: Coordinates, method: CalculationMethod) -> Result<String> {
            if self.fill.get() {
                let timings = decode_day(SAMPLE_BODY.as_bytes())?;
                let times = build_day(date, coords, method, &timings, &PrayerDefaults::default());
                PrayerTimeRepo::replace_for_day(self.conn, date, coords, method, &times)?;
            }
            let e = std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out");
            Err(PrayerTimeError::Network(Box::new(e)))
        }
    }

    #[test]
    fn test_offline_retry_hits_same_cell() {
        let fx = fixture();
        let source = RacingSource {
            conn: &fx.conn,
            fill: Cell::new(true),
        };
        let svc = PrayerTimeService::new(&fx.conn, &fx.files, &source, PrayerDefaults::default());

        let r = svc.resolve(monday(), islamabad(), METHOD).unwrap();
        assert_eq!(r.origin, Origin::OfflineFallback);
        assert!(r.is_offline());
        assert!(svc.is_offline());
        assert_eq!(r.times.len(), 5);
        assert_eq!(r.times[0].latitude, 33.7);
    }

    #[test]
    fn test_offline_flag_cleared_by_failed_resolve() {
        let fx = fixture();
        let source = RacingSource {
            conn: &fx.conn,
            fill: Cell::new(true),
        };
        let svc = PrayerTimeService::new(&fx.conn, &fx.files, &source, PrayerDefaults::default());
        svc.resolve(monday(), islamabad(), METHOD).unwrap();
        assert!(svc.is_offline());

        source.fill.set(false);
        let tuesday = monday().succ_opt().unwrap();
        assert!(svc.resolve(tuesday, islamabad(), METHOD).is_err());
        assert!(!svc.is_offline());
    }

    #[test]
    fn test_offline_without_any_cache_propagates_network_error() {
        let fx = fixture();
        let source = FakeSource::ok();
        source.fail.set(true);
        let svc = PrayerTimeService::new(&fx.conn, &fx.files, &source, PrayerDefaults::default());

        let err = svc.resolve(monday(), islamabad(), METHOD).unwrap_err();
        assert!(matches!(err, PrayerTimeError::Network(_)));
        assert!(!svc.is_offline());
    }

    #[test]
    fn test_offline_never_borrows_a_neighbouring_cell() {
        let fx = fixture();
        let source = FakeSource::ok();
        let svc = PrayerTimeService::new(&fx.conn, &fx.files, &source, PrayerDefaults::default());
        svc.resolve(monday(), Coordinates::new(33.70, 73.00), METHOD).unwrap();

        source.fail.set(true);
        // about 44 km east, inside the refresh radius but another cell
        let east = Coordinates::new(33.70, 73.48);
        assert!(matches!(
            svc.resolve(monday(), east, METHOD),
            Err(PrayerTimeError::Network(_))
        ));
        // a few metres away, same cell
        let r = svc.resolve(monday(), Coordinates::new(33.71, 73.01), METHOD).unwrap();
        assert_eq!(r.origin, Origin::Store);

        let lahore = Coordinates::new(31.5204, 74.3587);
        assert!(matches!(
            svc.resolve(monday(), lahore, METHOD),
            Err(PrayerTimeError::Network(_))
        ));
    }

    #[test]
    fn test_decode_failure_is_data_error_without_fallback() {
        let fx = fixture();
        let source = FakeSource::with_body("{\"data\": {}}");
        let svc = PrayerTimeService::new(&fx.conn, &fx.files, &source, PrayerDefaults::default());

        let err = svc.resolve(monday(), islamabad(), METHOD).unwrap_err();
        assert!(matches!(err, PrayerTimeError::Decode(_)));
        assert_eq!(source.calls.get(), 1);
        let key = cache_key(monday(), islamabad(), METHOD);
        assert!(fx.files.load(&key).unwrap().is_none());
    }

    #[test]
    fn test_friday_dhuhr_becomes_jumuah() {
        let fx = fixture();
        let source = FakeSource::ok();
        let svc = PrayerTimeService::new(&fx.conn, &fx.files, &source, PrayerDefaults::default());
        let friday = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();

        let r = svc.resolve(friday, islamabad(), METHOD).unwrap();
        let kinds: Vec<_> = r.times.iter().map(|t| t.kind).collect();
        assert!(kinds.contains(&PrayerKind::Jumuah));
        assert!(!kinds.contains(&PrayerKind::Dhuhr));
        let jumuah = r.times.iter().find(|t| t.kind == PrayerKind::Jumuah).unwrap();
        assert_eq!(jumuah.duration_minutes, 60);

        let monday = svc.resolve(monday(), islamabad(), METHOD).unwrap();
        assert!(monday.times.iter().any(|t| t.kind == PrayerKind::Dhuhr));
    }

    #[test]
    fn test_prefetch_skips_cached_days() {
        let fx = fixture();
        let source = FakeSource::ok();
        let svc = PrayerTimeService::new(&fx.conn, &fx.files, &source, PrayerDefaults::default());
        svc.resolve(monday(), islamabad(), METHOD).unwrap();

        let report = svc.prefetch(monday(), 3, islamabad(), METHOD, std::time::Duration::ZERO);
        assert_eq!(
            report,
            PrefetchReport {
                skipped: 1,
                fetched: 2,
                failed: 0
            }
        );
        assert_eq!(source.calls.get(), 3);
    }

    #[test]
    fn test_prefetch_continues_past_failures() {
        let fx = fixture();
        let source = FakeSource::ok();
        source.fail.set(true);
        let svc = PrayerTimeService::new(&fx.conn, &fx.files, &source, PrayerDefaults::default());

        let report = svc.prefetch(monday(), 4, islamabad(), METHOD, std::time::Duration::ZERO);
        assert_eq!(report.failed, 4);
        assert_eq!(source.calls.get(), 4);
    }

    #[test]
    fn test_prefetch_delay_only_spaces_network_requests() {
        let fx = fixture();
        let source = FakeSource::ok();
        let svc = PrayerTimeService::new(&fx.conn, &fx.files, &source, PrayerDefaults::default());
        for offset in 0..3 {
            let date = monday() + Duration::days(offset);
            fx.files.save(&cache_key(date, islamabad(), METHOD), SAMPLE_BODY.as_bytes()).unwrap();
        }

        let delay = std::time::Duration::from_millis(300);
        let started = std::time::Instant::now();
        let report = svc.prefetch(monday(), 3, islamabad(), METHOD, delay);
        assert!(started.elapsed() < delay);
        assert_eq!(report.fetched, 3);
        assert_eq!(source.calls.get(), 0);

        let delay = std::time::Duration::from_millis(40);
        let started = std::time::Instant::now();
        let report = svc.prefetch(monday(), 5, islamabad(), METHOD, delay);
        assert_eq!(report.skipped, 3);
        assert_eq!(report.fetched, 2);
        assert_eq!(source.calls.get(), 2);
        // one gap, between the two network requests
        assert!(started.elapsed() >= delay);
    }

    #[test]
    fn test_next_and_current_prayer() {
        let timings = decode_day(SAMPLE_BODY.as_bytes()).unwrap();
        let times = build_day(monday(), islamabad(), METHOD, &timings, &PrayerDefaults::default());

        let noon = monday().and_hms_opt(12, 0, 0).unwrap();
        assert_eq!(next_prayer(&times, noon).unwrap().kind, PrayerKind::Dhuhr);
        // Dhuhr 12:13 with a 5 minute lead-in
        assert!(current_prayer(&times, noon).is_none());
        let in_dhuhr = monday().and_hms_opt(12, 20, 0).unwrap();
        assert_eq!(current_prayer(&times, in_dhuhr).unwrap().kind, PrayerKind::Dhuhr);

        let late = monday().and_hms_opt(23, 0, 0).unwrap();
        assert!(next_prayer(&times, late).is_none());
    }

    #[test]
    fn test_require_location() {
        let mut loc = LocationConfig::default();
        assert!(matches!(require_location(&loc), Err(PrayerTimeError::LocationUnknown)));
        loc.latitude = Some(1.0);
        loc.longitude = Some(2.0);
        assert_eq!(require_location(&loc).unwrap(), Coordinates::new(1.0, 2.0));
    }
}
