use anyhow::{Context, Result};
use edgar_columnar::{persist_atomically, read_columnar, Compression};
use edgar_core::pool::TaskPool;
use edgar_core::GeoRecord;
use std::collections::{BTreeMap, BTreeSet};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::client::GeoLookup;

/// Outcome of one [`GeoLookupCache::resolve`] round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveSummary {
    pub requested: usize,
    pub needed: usize,
    pub resolved: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub rows: usize,
    pub resolved: usize,
    pub attempted: usize,
    pub attempted_unresolved: usize,
}

/// Persisted geolocation table keyed by `ip_from`.
///
/// Every address that went to the external service is kept with
/// `geolocation_db_attempted` set, resolved or not, so it is never queried
/// again.
pub struct GeoLookupCache {
    path: PathBuf,
    rows: BTreeMap<u32, GeoRecord>,
    compression: Compression,
    pool: TaskPool,
}

impl GeoLookupCache {
    /// Load the cache at `cache_path`, or seed it from the bulk reference
    /// table when no cache has been written yet.
    pub fn open(cache_path: &Path, reference_path: &Path, compression: Compression) -> Result<Self> {
        let rows = if cache_path.exists() {
            read_columnar::<GeoRecord>(cache_path)
                .with_context(|| format!("loading geo cache {}", cache_path.display()))?
        } else if reference_path.exists() {
            log::info!("seeding geo cache from {}", reference_path.display());
            read_columnar::<GeoRecord>(reference_path)
                .with_context(|| format!("loading reference table {}", reference_path.display()))?
        } else {
            log::warn!(
                "neither {} nor {} exists, starting with an empty geo cache",
                cache_path.display(),
                reference_path.display()
            );
            Vec::new()
        };
        let cache = Self::from_rows(cache_path, rows, compression);
        log::debug!("geo cache holds {} rows", cache.len());
        Ok(cache)
    }

    /// On duplicate keys the first settled row wins.
    pub fn from_rows(path: &Path, rows: Vec<GeoRecord>, compression: Compression) -> Self {
        let mut map: BTreeMap<u32, GeoRecord> = BTreeMap::new();
        for row in rows {
            match map.get(&row.ip_from) {
                Some(existing) if existing.is_settled() => {}
                _ => {
                    map.insert(row.ip_from, row);
                }
            }
        }
        GeoLookupCache { path: path.to_path_buf(), rows: map, compression, pool: TaskPool::new(16) }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.pool = TaskPool::new(workers);
        self
    }

    pub fn path(&self) -> &Path { &self.path }

    pub fn len(&self) -> usize { self.rows.len() }

    pub fn is_empty(&self) -> bool { self.rows.is_empty() }

    pub fn get(&self, ip: u32) -> Option<&GeoRecord> {
        self.rows.get(&ip)
    }

    /// Cache contents as a join table, ordered by `ip_from`.
    pub fn table(&self) -> &BTreeMap<u32, GeoRecord> {
        &self.rows
    }

    /// True when `ip` has neither a country nor a previous external attempt.
    pub fn needs_lookup(&self, ip: u32) -> bool {
        !self.rows.get(&ip).is_some_and(GeoRecord::is_settled)
    }

    /// Query the external service for every address in `ips` that still
    /// needs it, merge the answers and persist the cache.
    ///
    /// Nothing is written when no address needs a lookup.
    pub async fn resolve<L: GeoLookup + ?Sized + 'static>(&mut self, ips: &BTreeSet<u32>, lookup: Arc<L>) -> Result<ResolveSummary> {
        let needed: Vec<u32> = ips.iter().copied().filter(|ip| self.needs_lookup(*ip)).collect();
        let mut summary = ResolveSummary { requested: ips.len(), needed: needed.len(), ..Default::default() };
        if needed.is_empty() {
            log::debug!("all {} addresses already cached", ips.len());
            return Ok(summary);
        }
        log::info!("looking up {} of {} addresses with {} workers", needed.len(), ips.len(), self.pool.workers());

        let results = self
            .pool
            .run_all(needed, |ip| {
                let lookup = lookup.clone();
                async move { lookup.lookup(&Ipv4Addr::from(ip).to_string()).await }
            })
            .await;

        self.rows.retain(|_, g| g.is_settled());
        for (ip, found) in results {
            let found = found.unwrap_or_else(|e| {
                log::warn!("lookup of {} aborted: {e}", Ipv4Addr::from(ip));
                None
            });
            let row = match found {
                Some(mut g) => {
                    g.ip_from = ip;
                    g.ip_to = ip;
                    g.geolocation_db_attempted = true;
                    if g.is_resolved() {
                        summary.resolved += 1;
                    } else {
                        summary.failed += 1;
                    }
                    g
                }
                None => {
                    summary.failed += 1;
                    GeoRecord::attempted(ip)
                }
            };
            self.rows.insert(ip, row);
        }
        self.flush()?;
        log::info!("geo lookup: {} resolved, {} unresolved", summary.resolved, summary.failed);
        Ok(summary)
    }

    pub fn flush(&self) -> Result<()> {
        let rows: Vec<GeoRecord> = self.rows.values().cloned().collect();
        persist_atomically(&rows, &self.path, self.compression)
            .with_context(|| format!("persisting geo cache {}", self.path.display()))
    }

    /// Clear the attempted flag on rows that never resolved, making them
    /// eligible for another lookup. Returns how many rows changed.
    pub fn reset_attempts(&mut self) -> usize {
        let mut n = 0;
        for g in self.rows.values_mut() {
            if g.geolocation_db_attempted && !g.is_resolved() {
                g.geolocation_db_attempted = false;
                n += 1;
            }
        }
        n
    }

    pub fn stats(&self) -> CacheStats {
        let mut s = CacheStats { rows: self.rows.len(), ..Default::default() };
        for g in self.rows.values() {
            if g.is_resolved() {
                s.resolved += 1;
            }
            if g.geolocation_db_attempted {
                s.attempted += 1;
                if !g.is_resolved() {
                    s.attempted_unresolved += 1;
                }
            }
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use edgar_columnar::write_columnar;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Resolves addresses in 10.0.0.0/8 and fails everything else.
    #[derive(Default)]
    struct FakeLookup {
        calls: AtomicUsize,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl GeoLookup for FakeLookup {
        async fn lookup(&self, ip: &str) -> Option<GeoRecord> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(ip.to_string());
            ip.starts_with("10.").then(|| GeoRecord {
                country_code: Some("US".into()),
                country_name: Some("United States".into()),
                ..Default::default()
            })
        }
    }

    /// Panics on 172.16.0.0/12, fails everything else.
    struct PanickingLookup;

    #[async_trait]
    impl GeoLookup for PanickingLookup {
        async fn lookup(&self, ip: &str) -> Option<GeoRecord> {
            if ip.starts_with("172.") {
                panic!("decoder blew up on {ip}");
            }
            None
        }
    }

    fn key(a: u8, b: u8, c: u8) -> u32 {
        u32::from(Ipv4Addr::new(a, b, c, 0))
    }

    #[tokio::test]
    async fn settled_addresses_are_not_queried_again() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("geo_cache.parquet");
        let mut cache = GeoLookupCache::from_rows(&path, Vec::new(), Compression::Gzip).with_workers(4);
        let lookup = Arc::new(FakeLookup::default());
        let ips: BTreeSet<u32> = [key(10, 1, 1), key(192, 0, 2)].into();

        let first = cache.resolve(&ips, lookup.clone()).await.unwrap();
        assert_eq!(first, ResolveSummary { requested: 2, needed: 2, resolved: 1, failed: 1 });
        assert!(path.exists());

        let second = cache.resolve(&ips, lookup.clone()).await.unwrap();
        assert_eq!(second.needed, 0);
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 2);

        let failed = cache.get(key(192, 0, 2)).unwrap();
        assert!(failed.geolocation_db_attempted);
        assert!(!failed.is_resolved());
    }

    #[tokio::test]
    async fn panicked_lookup_is_recorded_as_attempted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("geo_cache.parquet");
        let mut cache = GeoLookupCache::from_rows(&path, Vec::new(), Compression::Gzip).with_workers(2);
        let ips: BTreeSet<u32> = [key(172, 16, 0), key(192, 0, 2)].into();

        let s = cache.resolve(&ips, Arc::new(PanickingLookup)).await.unwrap();
        assert_eq!(s, ResolveSummary { requested: 2, needed: 2, resolved: 0, failed: 2 });
        assert!(cache.get(key(172, 16, 0)).is_some_and(|g| g.geolocation_db_attempted));
        assert!(!cache.needs_lookup(key(172, 16, 0)));
    }

    #[tokio::test]
    async fn nothing_written_when_nothing_needed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("geo_cache.parquet");
        let seeded = GeoRecord { ip_from: key(1, 2, 3), ip_to: key(1, 2, 3), country_code: Some("AU".into()), ..Default::default() };
        let mut cache = GeoLookupCache::from_rows(&path, vec![seeded], Compression::Gzip);
        let lookup = Arc::new(FakeLookup::default());
        let s = cache.resolve(&[key(1, 2, 3)].into(), lookup.clone()).await.unwrap();
        assert_eq!(s.needed, 0);
        assert!(!path.exists());
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn seeds_from_reference_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let cache_path = dir.path().join("geo_cache.parquet");
        let reference = dir.path().join("ip2_location.parquet");
        write_columnar(
            &[
                GeoRecord { ip_from: key(1, 0, 0), ip_to: key(1, 0, 0) + 255, country_code: Some("AU".into()), ..Default::default() },
                GeoRecord { ip_from: key(10, 9, 9), ip_to: key(10, 9, 9), ..Default::default() },
            ],
            &reference,
            Compression::Gzip,
        )
        .unwrap();

        let mut cache = GeoLookupCache::open(&cache_path, &reference, Compression::Gzip).unwrap().with_workers(2);
        assert_eq!(cache.len(), 2);
        assert!(!cache.needs_lookup(key(1, 0, 0)));
        assert!(cache.needs_lookup(key(10, 9, 9)));

        let lookup = Arc::new(FakeLookup::default());
        let ips: BTreeSet<u32> = [key(1, 0, 0), key(10, 9, 9)].into();
        cache.resolve(&ips, lookup.clone()).await.unwrap();
        assert_eq!(lookup.seen.lock().unwrap().as_slice(), ["10.9.9.0"]);

        let reopened = GeoLookupCache::open(&cache_path, &reference, Compression::Gzip).unwrap();
        assert_eq!(reopened.table(), cache.table());
        assert_eq!(reopened.get(key(10, 9, 9)).and_then(|g| g.country_code.as_deref()), Some("US"));
        assert_eq!(reopened.get(key(1, 0, 0)).map(|g| g.ip_to), Some(key(1, 0, 0) + 255));
    }

    #[tokio::test]
    async fn unsettled_reference_rows_dropped_on_flush() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("geo_cache.parquet");
        let rows = vec![
            GeoRecord { ip_from: key(5, 5, 5), ip_to: key(5, 5, 5), ..Default::default() },
            GeoRecord { ip_from: key(6, 6, 6), ip_to: key(6, 6, 6), country_code: Some("DE".into()), ..Default::default() },
        ];
        let mut cache = GeoLookupCache::from_rows(&path, rows, Compression::Gzip);
        cache.resolve(&[key(10, 0, 1)].into(), Arc::new(FakeLookup::default())).await.unwrap();

        assert!(cache.get(key(5, 5, 5)).is_none());
        assert!(cache.get(key(6, 6, 6)).is_some());
        assert_eq!(read_columnar::<GeoRecord>(&path).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn reset_makes_failures_eligible() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("geo_cache.parquet");
        let mut cache = GeoLookupCache::from_rows(&path, Vec::new(), Compression::Gzip);
        let lookup = Arc::new(FakeLookup::default());
        let ips: BTreeSet<u32> = [key(10, 0, 0), key(172, 16, 0), key(203, 0, 113)].into();
        cache.resolve(&ips, lookup.clone()).await.unwrap();

        let stats = cache.stats();
        assert_eq!(stats, CacheStats { rows: 3, resolved: 1, attempted: 3, attempted_unresolved: 2 });

        assert_eq!(cache.reset_attempts(), 2);
        assert!(cache.needs_lookup(key(172, 16, 0)));
        assert!(!cache.needs_lookup(key(10, 0, 0)));
        let again = cache.resolve(&ips, lookup.clone()).await.unwrap();
        assert_eq!(again.needed, 2);
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn duplicate_keys_keep_settled_row() {
        let path = PathBuf::from("unused.parquet");
        let rows = vec![
            GeoRecord { ip_from: 7, ip_to: 7, country_code: Some("NL".into()), ..Default::default() },
            GeoRecord { ip_from: 7, ip_to: 7, ..Default::default() },
            GeoRecord { ip_from: 8, ip_to: 8, ..Default::default() },
            GeoRecord::attempted(8),
        ];
        let cache = GeoLookupCache::from_rows(&path, rows, Compression::Gzip);
        assert_eq!(cache.get(7).and_then(|g| g.country_code.as_deref()), Some("NL"));
        assert!(cache.get(8).unwrap().geolocation_db_attempted);
    }
}
