//! Shared Cache Store
//!
//! Fan-out writes and priority-ordered read sweeps over the candidate
//! storage locations. A read sweep tolerates corrupt or missing files at
//! individual locations and retries the whole sweep a bounded number of
//! times, since the peer's write may still be in flight.

use std::fs;
use std::io::Write;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::errors::SyncError;
use crate::model::{unix_now, CacheEntry};
use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::store::location::{default_locations, StorageLocation};

/// Why a read sweep produced no fresh entry
///
/// `Empty` and `Stale` are distinct so callers can show old data with a
/// warning instead of an empty state. `Stale` carries the freshest entry
/// found anywhere, already past its TTL.
#[derive(Debug, Clone)]
pub enum CacheMiss {
    /// No entry was found at any location, fresh or stale
    Empty,
    /// An entry exists everywhere it was found, but exceeded the TTL
    Stale(Box<CacheEntry>),
}

impl std::fmt::Display for CacheMiss {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheMiss::Empty => write!(f, "cache empty"),
            CacheMiss::Stale(entry) => {
                write!(f, "cache stale (captured at {})", entry.captured_at)
            }
        }
    }
}

impl From<CacheMiss> for SyncError {
    fn from(miss: CacheMiss) -> Self {
        match miss {
            CacheMiss::Empty => SyncError::CacheEmpty,
            CacheMiss::Stale(_) => SyncError::CacheStale,
        }
    }
}

/// TTL-governed store for the single latest snapshot
pub struct SharedCacheStore {
    /// Candidate roots in read-priority order
    locations: Vec<StorageLocation>,
    /// Maximum entry age before it is reported stale
    ttl: Duration,
}

impl SharedCacheStore {
    /// Create a store over an explicit ordered location list
    pub fn new(locations: Vec<StorageLocation>, ttl: Duration) -> Self {
        if locations.is_empty() {
            warn!("Store created with no storage locations; writes will fail");
        }
        Self { locations, ttl }
    }

    /// Create a store over the process-wide default locations
    pub fn with_default_locations(ttl: Duration) -> Self {
        Self::new(default_locations().to_vec(), ttl)
    }

    /// Persist `entry` to every known location
    ///
    /// Succeeds if at least one location accepts the write. Individual
    /// location failures are logged and skipped.
    pub fn write(&self, entry: &CacheEntry) -> Result<(), SyncError> {
        let bytes = serde_json::to_vec(entry)
            .map_err(|e| SyncError::SaveFailed(format!("encode: {}", e)))?;

        let mut written = 0usize;
        for location in &self.locations {
            match self.write_location(location, &bytes) {
                Ok(()) => {
                    debug!(
                        location = %location.name,
                        size = bytes.len(),
                        "Wrote snapshot"
                    );
                    written += 1;
                }
                Err(e) => {
                    warn!(
                        location = %location.name,
                        root = %location.root.display(),
                        error = %e,
                        "Failed to write snapshot at location"
                    );
                }
            }
        }

        if written == 0 {
            return Err(SyncError::AllLocationsUnwritable);
        }
        info!(
            locations = written,
            records = entry.snapshot.records.len(),
            size = bytes.len(),
            "Saved snapshot"
        );
        Ok(())
    }

    /// Atomic write at one location: temp file in the same directory, then
    /// rename over the cache file.
    fn write_location(&self, location: &StorageLocation, bytes: &[u8]) -> Result<(), SyncError> {
        fs::create_dir_all(&location.root)
            .map_err(|e| SyncError::SaveFailed(format!("create dir: {}", e)))?;

        let mut tmp = tempfile::NamedTempFile::new_in(&location.root)
            .map_err(|e| SyncError::SaveFailed(format!("temp file: {}", e)))?;
        tmp.write_all(bytes)
            .map_err(|e| SyncError::SaveFailed(format!("write: {}", e)))?;
        tmp.persist(location.cache_file())
            .map_err(|e| SyncError::SaveFailed(format!("persist: {}", e)))?;
        Ok(())
    }

    /// Read the freshest entry, sweeping all locations in priority order
    ///
    /// Repeats the full sweep up to `max_retries` times with `retry_delay`
    /// between sweeps, tolerating a peer write still in flight. On
    /// exhaustion the miss says whether anything (stale) was ever found.
    pub async fn read(
        &self,
        max_retries: u32,
        retry_delay: Duration,
    ) -> Result<CacheEntry, CacheMiss> {
        let policy = RetryPolicy::fixed(max_retries.max(1), retry_delay);
        let this = self;
        retry_with_backoff("cache-read-sweep", &policy, move || async move {
            this.sweep()
        })
        .await
    }

    /// One pass over every location: first fresh hit wins
    fn sweep(&self) -> Result<CacheEntry, CacheMiss> {
        let now = unix_now();
        let mut best_stale: Option<CacheEntry> = None;

        for location in &self.locations {
            let entry = match self.read_location(location) {
                Ok(Some(entry)) => entry,
                Ok(None) => continue,
                Err(e) => {
                    // Never fail the sweep on a single corrupt location
                    warn!(
                        location = %location.name,
                        error = %e,
                        "Skipping unreadable location"
                    );
                    continue;
                }
            };

            if entry.is_fresh(self.ttl, now) {
                debug!(
                    location = %location.name,
                    age_secs = entry.age(now).as_secs(),
                    "Cache hit"
                );
                return Ok(entry);
            }

            debug!(
                location = %location.name,
                age_secs = entry.age(now).as_secs(),
                "Entry expired at location"
            );
            let is_fresher = best_stale
                .as_ref()
                .map(|best| entry.captured_at > best.captured_at)
                .unwrap_or(true);
            if is_fresher {
                best_stale = Some(entry);
            }
        }

        match best_stale {
            Some(entry) => Err(CacheMiss::Stale(Box::new(entry))),
            None => Err(CacheMiss::Empty),
        }
    }

    /// Load and decode the entry at one location, if present
    fn read_location(&self, location: &StorageLocation) -> Result<Option<CacheEntry>, SyncError> {
        let path = location.cache_file();
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(SyncError::LoadFailed(format!("read: {}", e))),
        };

        let entry: CacheEntry = serde_json::from_slice(&bytes)
            .map_err(|e| SyncError::LoadFailed(format!("decode: {}", e)))?;
        entry.snapshot.validate()?;
        Ok(Some(entry))
    }

    /// Best-effort delete across all locations; a missing file is not an error
    pub fn clear(&self) {
        for location in &self.locations {
            let path = location.cache_file();
            match fs::remove_file(&path) {
                Ok(()) => info!(location = %location.name, "Cleared cache"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!(location = %location.name, "No cache to clear")
                }
                Err(e) => {
                    warn!(location = %location.name, error = %e, "Failed to clear cache")
                }
            }
        }
    }

    /// TTL this store applies to reads
    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{HourlyRecord, Snapshot};
    use crate::store::location::CACHE_FILE_NAME;
    use tempfile::TempDir;

    const TTL: Duration = Duration::from_secs(15 * 60);

    fn record(ts: u64) -> HourlyRecord {
        HourlyRecord {
            timestamp: ts,
            temperature_f: 60.0,
            cloud_cover_pct: 30.0,
            wind_speed_mph: 8.0,
            precip_prob_pct: 10.0,
        }
    }

    fn entry_captured_at(captured_at: u64) -> CacheEntry {
        let snapshot = Snapshot::new(vec![record(100), record(3700)], None).unwrap();
        CacheEntry::new(snapshot, captured_at)
    }

    fn store_over(dirs: &[&TempDir]) -> SharedCacheStore {
        let locations = dirs
            .iter()
            .enumerate()
            .map(|(i, d)| StorageLocation::new(format!("loc{}", i), d.path()))
            .collect();
        SharedCacheStore::new(locations, TTL)
    }

    #[tokio::test]
    async fn test_write_then_read_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = store_over(&[&dir]);
        let entry = entry_captured_at(unix_now());

        store.write(&entry).unwrap();
        let loaded = store.read(1, Duration::from_millis(1)).await.unwrap();
        assert_eq!(loaded, entry);
    }

    #[tokio::test]
    async fn test_stale_entry_is_reported_stale_not_fresh() {
        let dir = TempDir::new().unwrap();
        let store = store_over(&[&dir]);
        // 16 minutes old under a 15 minute TTL
        let entry = entry_captured_at(unix_now() - 16 * 60);
        store.write(&entry).unwrap();

        match store.read(1, Duration::from_millis(1)).await {
            Err(CacheMiss::Stale(stale)) => assert_eq!(*stale, entry),
            other => panic!("expected stale miss, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_store_reports_empty() {
        let dir = TempDir::new().unwrap();
        let store = store_over(&[&dir]);
        match store.read(2, Duration::from_millis(1)).await {
            Err(CacheMiss::Empty) => {}
            other => panic!("expected empty miss, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_corrupt_location_falls_through_to_next() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        let store = store_over(&[&first, &second]);

        // Corrupt file at the highest-priority location
        fs::write(first.path().join(CACHE_FILE_NAME), b"{not json").unwrap();
        let entry = entry_captured_at(unix_now());
        fs::write(
            second.path().join(CACHE_FILE_NAME),
            serde_json::to_vec(&entry).unwrap(),
        )
        .unwrap();

        let loaded = store.read(1, Duration::from_millis(1)).await.unwrap();
        assert_eq!(loaded, entry);
    }

    #[tokio::test]
    async fn test_write_fans_out_to_all_locations() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        let store = store_over(&[&first, &second]);

        let entry = entry_captured_at(unix_now());
        store.write(&entry).unwrap();

        assert!(first.path().join(CACHE_FILE_NAME).exists());
        assert!(second.path().join(CACHE_FILE_NAME).exists());
    }

    #[tokio::test]
    async fn test_write_succeeds_with_one_writable_location() {
        let good = TempDir::new().unwrap();
        // Root under a regular file can never be created
        let blocker = good.path().join("blocker");
        fs::write(&blocker, b"x").unwrap();

        let store = SharedCacheStore::new(
            vec![
                StorageLocation::new("bad", blocker.join("sub")),
                StorageLocation::new("good", good.path()),
            ],
            TTL,
        );

        let entry = entry_captured_at(unix_now());
        store.write(&entry).unwrap();
        assert!(good.path().join(CACHE_FILE_NAME).exists());
    }

    #[tokio::test]
    async fn test_write_fails_only_when_every_location_fails() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"x").unwrap();

        let store = SharedCacheStore::new(
            vec![StorageLocation::new("bad", blocker.join("sub"))],
            TTL,
        );

        let entry = entry_captured_at(unix_now());
        match store.write(&entry) {
            Err(SyncError::AllLocationsUnwritable) => {}
            other => panic!("expected AllLocationsUnwritable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_clear_tolerates_missing_files() {
        let dir = TempDir::new().unwrap();
        let store = store_over(&[&dir]);
        // Nothing written yet; must not panic or error
        store.clear();

        store.write(&entry_captured_at(unix_now())).unwrap();
        store.clear();
        assert!(!dir.path().join(CACHE_FILE_NAME).exists());
    }

    #[tokio::test]
    async fn test_stale_reports_freshest_entry_across_locations() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        let store = store_over(&[&first, &second]);

        let older = entry_captured_at(unix_now() - 30 * 60);
        let newer = entry_captured_at(unix_now() - 16 * 60);
        fs::write(
            first.path().join(CACHE_FILE_NAME),
            serde_json::to_vec(&older).unwrap(),
        )
        .unwrap();
        fs::write(
            second.path().join(CACHE_FILE_NAME),
            serde_json::to_vec(&newer).unwrap(),
        )
        .unwrap();

        match store.read(1, Duration::from_millis(1)).await {
            Err(CacheMiss::Stale(stale)) => assert_eq!(stale.captured_at, newer.captured_at),
            other => panic!("expected stale miss, got {:?}", other),
        }
    }
}
