//! Snapshot data model shared by host and companion

pub mod snapshot;

pub use snapshot::{unix_now, CacheEntry, HourlyRecord, Snapshot};
