//! Storage Location Discovery
//!
//! A write from one process may only be visible under a root the other
//! process doesn't probe by default, so the store works against an ordered
//! list of candidate roots rather than a single path. The list is
//! configuration: callers can pass their own, set `WXSYNC_CACHE_DIRS`, or
//! fall back to the platform cache/data directories.

use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;

use tracing::debug;

/// File name of the snapshot document under each location root
pub const CACHE_FILE_NAME: &str = "weather_snapshot.json";

/// Environment variable listing extra cache roots (PATH-style separator),
/// probed before the platform defaults
pub const CACHE_DIRS_ENV: &str = "WXSYNC_CACHE_DIRS";

/// One candidate persistence root for the shared snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLocation {
    /// Short label for logs
    pub name: String,
    /// Directory the cache file lives in
    pub root: PathBuf,
}

impl StorageLocation {
    /// Create a location rooted at `root`
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
        }
    }

    /// Full path of the cache file at this location
    pub fn cache_file(&self) -> PathBuf {
        self.root.join(CACHE_FILE_NAME)
    }
}

/// Default ordered location list, resolved once per process
pub fn default_locations() -> &'static [StorageLocation] {
    static LOCATIONS: OnceLock<Vec<StorageLocation>> = OnceLock::new();
    LOCATIONS.get_or_init(|| {
        let locations = discover_locations();
        debug!(count = locations.len(), "Resolved storage locations");
        for location in &locations {
            debug!(name = %location.name, root = %location.root.display(), "Candidate location");
        }
        locations
    })
}

/// Build the candidate list: env-configured roots first (highest priority),
/// then the platform cache and data directories.
fn discover_locations() -> Vec<StorageLocation> {
    let mut locations = Vec::new();

    if let Some(list) = env::var_os(CACHE_DIRS_ENV) {
        for (i, root) in env::split_paths(&list).enumerate() {
            if !root.as_os_str().is_empty() {
                locations.push(StorageLocation::new(format!("env{}", i), root));
            }
        }
    }

    if let Some(cache_dir) = dirs::cache_dir() {
        locations.push(StorageLocation::new("cache", cache_dir.join("wxsync")));
    }
    if let Some(data_dir) = dirs::data_local_dir() {
        locations.push(StorageLocation::new("data", data_dir.join("wxsync")));
    }

    locations.dedup_by(|a, b| a.root == b.root);
    locations
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_file_path() {
        let location = StorageLocation::new("test", "/tmp/wxsync-test");
        assert_eq!(
            location.cache_file(),
            PathBuf::from("/tmp/wxsync-test/weather_snapshot.json")
        );
    }

    #[test]
    fn test_defaults_are_memoized() {
        let first = default_locations();
        let second = default_locations();
        assert_eq!(first.as_ptr(), second.as_ptr());
    }
}
