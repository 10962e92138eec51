//! Sync Error Types
//!
//! Structured error handling for the cache store, transfer codec, and
//! transport layers. Distinguishes "no data was ever obtained" from
//! "data exists but is old" so callers can fall back to stale data.

/// Errors surfaced by the sync subsystem
#[derive(Debug, Clone, thiserror::Error)]
pub enum SyncError {
    #[error("Cache is empty: no snapshot was ever stored")]
    CacheEmpty,

    #[error("Cache is stale: snapshot exceeded its TTL at every location")]
    CacheStale,

    #[error("Save failed: {0}")]
    SaveFailed(String),

    #[error("Load failed: {0}")]
    LoadFailed(String),

    #[error("Every storage location rejected the write")]
    AllLocationsUnwritable,

    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("Peer is not reachable")]
    Unreachable,

    #[error("Request timed out")]
    Timeout,

    #[error("Malformed chunk: {0}")]
    MalformedChunk(String),

    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("Peer error: {0}")]
    PeerError(String),
}

impl SyncError {
    /// Whether the orchestrator's retry loop should try again after this error
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::CacheEmpty
                | SyncError::CacheStale
                | SyncError::Unreachable
                | SyncError::Timeout
                | SyncError::MalformedChunk(_)
                | SyncError::ProtocolViolation(_)
                | SyncError::PeerError(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_errors_are_retryable() {
        assert!(SyncError::Unreachable.is_retryable());
        assert!(SyncError::Timeout.is_retryable());
        assert!(SyncError::PeerError("boom".into()).is_retryable());
        assert!(SyncError::MalformedChunk("index 9".into()).is_retryable());
    }

    #[test]
    fn test_storage_errors_are_terminal() {
        assert!(!SyncError::AllLocationsUnwritable.is_retryable());
        assert!(!SyncError::SaveFailed("disk full".into()).is_retryable());
        assert!(!SyncError::InvalidSnapshot("unsorted".into()).is_retryable());
    }
}
