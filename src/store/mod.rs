//! Shared cache store
//!
//! Persists the single latest snapshot across one or more candidate storage
//! locations with TTL-based freshness. Either process may write at any time;
//! writes are atomic (temp file + rename) so readers never observe a partial
//! entry.

pub mod location;
pub mod shared_cache;

pub use location::{default_locations, StorageLocation, CACHE_FILE_NAME};
pub use shared_cache::{CacheMiss, SharedCacheStore};
