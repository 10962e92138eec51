//! Weather Snapshot Model
//!
//! Defines the hourly forecast records and the cached snapshot document that
//! both processes read and write. The on-disk and on-wire form is the same
//! JSON document: `{records: [...], captureTimestamp: n, image: "<base64>"?}`.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::errors::SyncError;

/// One hourly forecast record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HourlyRecord {
    /// Forecast hour as Unix seconds
    pub timestamp: u64,
    /// Temperature in degrees Fahrenheit
    pub temperature_f: f64,
    /// Cloud cover percentage (0-100)
    pub cloud_cover_pct: f64,
    /// Wind speed in miles per hour
    pub wind_speed_mph: f64,
    /// Precipitation probability percentage (0-100)
    pub precip_prob_pct: f64,
}

/// An ordered run of hourly records plus an optional static image
///
/// Invariant: records are sorted ascending by timestamp with no duplicates.
/// Enforced at construction; deserialized snapshots are re-validated before
/// they reach the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Hourly forecast records, ascending by timestamp
    pub records: Vec<HourlyRecord>,
    /// Opaque image bytes (base64 on the wire), absent when not fetched
    #[serde(default, skip_serializing_if = "Option::is_none", with = "opt_base64")]
    pub image: Option<Vec<u8>>,
}

impl Snapshot {
    /// Create a snapshot, validating record ordering
    pub fn new(records: Vec<HourlyRecord>, image: Option<Vec<u8>>) -> Result<Self, SyncError> {
        for pair in records.windows(2) {
            if pair[1].timestamp <= pair[0].timestamp {
                return Err(SyncError::InvalidSnapshot(format!(
                    "records not strictly ascending at timestamp {}",
                    pair[1].timestamp
                )));
            }
        }
        Ok(Self { records, image })
    }

    /// Re-check the ordering invariant (used after deserializing peer data)
    pub fn validate(&self) -> Result<(), SyncError> {
        Self::new(self.records.clone(), None).map(|_| ())
    }
}

/// The single latest snapshot together with its capture time
///
/// This is the unit the Shared Cache Store persists. It is always
/// wholesale-overwritten, never partially mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    #[serde(flatten)]
    pub snapshot: Snapshot,
    /// When the snapshot was captured from upstream, Unix seconds
    #[serde(rename = "captureTimestamp")]
    pub captured_at: u64,
}

impl CacheEntry {
    /// Create an entry captured at the given time
    pub fn new(snapshot: Snapshot, captured_at: u64) -> Self {
        Self {
            snapshot,
            captured_at,
        }
    }

    /// Create an entry captured now
    pub fn captured_now(snapshot: Snapshot) -> Self {
        Self::new(snapshot, unix_now())
    }

    /// Age of the entry relative to `now`
    pub fn age(&self, now: u64) -> Duration {
        Duration::from_secs(now.saturating_sub(self.captured_at))
    }

    /// Whether the entry is still within its TTL at time `now`
    pub fn is_fresh(&self, ttl: Duration, now: u64) -> bool {
        self.age(now) <= ttl
    }
}

/// Current time as Unix seconds
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Serialize optional byte blobs as base64 strings
mod opt_base64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(
        bytes: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(b) => STANDARD.encode(b).serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        let encoded: Option<String> = Option::deserialize(deserializer)?;
        match encoded {
            Some(s) => STANDARD
                .decode(s.as_bytes())
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hourly(ts: u64) -> HourlyRecord {
        HourlyRecord {
            timestamp: ts,
            temperature_f: 58.0,
            cloud_cover_pct: 40.0,
            wind_speed_mph: 12.5,
            precip_prob_pct: 5.0,
        }
    }

    #[test]
    fn test_snapshot_rejects_unsorted_records() {
        let err = Snapshot::new(vec![hourly(200), hourly(100)], None).unwrap_err();
        assert!(matches!(err, SyncError::InvalidSnapshot(_)));
    }

    #[test]
    fn test_snapshot_rejects_duplicate_timestamps() {
        let err = Snapshot::new(vec![hourly(100), hourly(100)], None).unwrap_err();
        assert!(matches!(err, SyncError::InvalidSnapshot(_)));
    }

    #[test]
    fn test_entry_freshness_boundary() {
        let ttl = Duration::from_secs(15 * 60);
        let snapshot = Snapshot::new(vec![hourly(100)], None).unwrap();
        let entry = CacheEntry::new(snapshot, 1_000_000);

        // Exactly at the TTL is still fresh
        assert!(entry.is_fresh(ttl, 1_000_000 + 15 * 60));
        // One minute past (16 min old) is stale
        assert!(!entry.is_fresh(ttl, 1_000_000 + 16 * 60));
    }

    #[test]
    fn test_json_uses_camel_case_keys() {
        let snapshot = Snapshot::new(vec![hourly(100)], Some(vec![1, 2, 3])).unwrap();
        let entry = CacheEntry::new(snapshot, 42);
        let json = serde_json::to_string(&entry).unwrap();

        assert!(json.contains("\"captureTimestamp\":42"));
        assert!(json.contains("temperatureF"));
        assert!(json.contains("cloudCoverPct"));
        assert!(json.contains("windSpeedMph"));
        assert!(json.contains("precipProbPct"));
        // Image travels as base64, not a number array
        assert!(json.contains("\"image\":\"AQID\""));
    }

    #[test]
    fn test_json_round_trip() {
        let snapshot = Snapshot::new(vec![hourly(100), hourly(3700)], Some(vec![9; 64])).unwrap();
        let entry = CacheEntry::captured_now(snapshot);
        let json = serde_json::to_vec(&entry).unwrap();
        let back: CacheEntry = serde_json::from_slice(&json).unwrap();
        assert_eq!(entry, back);
    }

    #[test]
    fn test_image_absent_is_omitted() {
        let snapshot = Snapshot::new(vec![hourly(100)], None).unwrap();
        let entry = CacheEntry::new(snapshot, 1);
        let json = serde_json::to_string(&entry).unwrap();
        assert!(!json.contains("image"));
        let back: CacheEntry = serde_json::from_str(&json).unwrap();
        assert!(back.snapshot.image.is_none());
    }
}
