//! Sync Configuration
//!
//! Tunables for the cache store, transfer protocol, and retry behavior.
//! Storage roots are configured separately via [`crate::store::StorageLocation`].

use std::time::Duration;

use crate::retry::RetryPolicy;

/// Default snapshot TTL: 15 minutes
pub const DEFAULT_TTL: Duration = Duration::from_secs(15 * 60);

/// Default single-message / chunk size limit: 16 KiB
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 16 * 1024;

/// Default pacing delay between pushed chunks
pub const DEFAULT_INTER_CHUNK_DELAY: Duration = Duration::from_millis(100);

/// Default overall bound on one transfer attempt
pub const DEFAULT_TRANSFER_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration shared by the orchestrator, responder, and store
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Maximum age before a cached snapshot is treated as stale
    pub ttl: Duration,
    /// Largest payload sent as a single message; larger payloads are chunked
    pub max_chunk_size: usize,
    /// Delay between consecutive chunk sends (backpressure on the peer)
    pub inter_chunk_delay: Duration,
    /// Overall deadline for one request + transfer attempt
    pub transfer_timeout: Duration,
    /// Full-sweep retries inside one store read
    pub read_retries: u32,
    /// Fixed delay between store read sweeps
    pub read_retry_delay: Duration,
    /// Retry policy for the orchestrator's outer attempt loop
    pub retry: RetryPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            inter_chunk_delay: DEFAULT_INTER_CHUNK_DELAY,
            transfer_timeout: DEFAULT_TRANSFER_TIMEOUT,
            read_retries: 3,
            read_retry_delay: Duration::from_secs(2),
            retry: RetryPolicy::default(),
        }
    }
}

impl SyncConfig {
    /// Fast variant for tests: millisecond delays, same structure
    #[cfg(test)]
    pub fn test() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            inter_chunk_delay: Duration::from_millis(1),
            transfer_timeout: Duration::from_millis(250),
            read_retries: 1,
            read_retry_delay: Duration::from_millis(1),
            retry: RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_millis(2),
                backoff_multiplier: 2.0,
            },
        }
    }
}
