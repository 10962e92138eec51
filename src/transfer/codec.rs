//! Snapshot Split and Reassembly
//!
//! The transport is request/reply per message with a bounded message size,
//! not a stream. A snapshot that fits the limit goes out as one message;
//! anything larger is cut into `ceil(size / max_chunk_size)` tagged chunks.
//! Chunks arrive in send order; the receiver appends them to an
//! accumulation buffer and reassembles when the count is satisfied.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::SyncError;
use crate::model::CacheEntry;

/// A bounded-size fragment of a serialized snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    /// Position of this fragment, `0..total_count`
    pub index: u32,
    /// Total fragments in the transfer
    pub total_count: u32,
    /// Fragment bytes
    pub payload: Vec<u8>,
}

/// Result of encoding an entry against a message-size limit
#[derive(Debug, Clone, PartialEq)]
pub enum Encoded {
    /// Fits in one message
    Single(Vec<u8>),
    /// Must be streamed as ordered chunks
    Chunked(Vec<Chunk>),
}

/// Serialize `entry` and split it if it exceeds `max_chunk_size`
pub fn encode(entry: &CacheEntry, max_chunk_size: usize) -> Result<Encoded, SyncError> {
    if max_chunk_size == 0 {
        return Err(SyncError::SaveFailed("chunk size must be non-zero".into()));
    }
    let bytes = serde_json::to_vec(entry)
        .map_err(|e| SyncError::SaveFailed(format!("encode snapshot: {}", e)))?;

    if bytes.len() <= max_chunk_size {
        return Ok(Encoded::Single(bytes));
    }

    let total = bytes.len().div_ceil(max_chunk_size) as u32;
    let chunks = bytes
        .chunks(max_chunk_size)
        .enumerate()
        .map(|(index, payload)| Chunk {
            index: index as u32,
            total_count: total,
            payload: payload.to_vec(),
        })
        .collect();

    debug!(
        size = bytes.len(),
        chunk_size = max_chunk_size,
        chunks = total,
        "Split snapshot into chunks"
    );
    Ok(Encoded::Chunked(chunks))
}

/// Decode and validate a reassembled (or single-message) snapshot
pub fn decode_entry(bytes: &[u8]) -> Result<CacheEntry, SyncError> {
    let entry: CacheEntry = serde_json::from_slice(bytes)
        .map_err(|e| SyncError::LoadFailed(format!("decode snapshot: {}", e)))?;
    entry.snapshot.validate()?;
    Ok(entry)
}

/// Progress of an in-flight reassembly
#[derive(Debug, PartialEq)]
pub enum ChunkOutcome {
    /// More chunks expected
    InProgress { received: u32 },
    /// All chunks received; the reassembled payload
    Complete(Vec<u8>),
}

/// Receiver-side accumulation state for one chunked transfer
///
/// Invariant: `received <= expected`; reassembly happens only when they are
/// equal. The companion holds at most one session at a time.
#[derive(Debug)]
pub struct TransferSession {
    expected: u32,
    received: u32,
    buffer: Vec<u8>,
}

impl TransferSession {
    /// Allocate an empty session expecting `expected` chunks
    pub fn begin(expected: u32) -> Self {
        debug!(expected = expected, "Transfer session started");
        Self {
            expected,
            received: 0,
            buffer: Vec::new(),
        }
    }

    /// Accept the next chunk, in arrival order
    ///
    /// Out-of-order arrival and chunks past a completed transfer are
    /// protocol violations; an index outside `[0, total_count)` or a total
    /// that disagrees with the session is malformed.
    pub fn receive(&mut self, chunk: Chunk) -> Result<ChunkOutcome, SyncError> {
        if self.received == self.expected {
            return Err(SyncError::ProtocolViolation(format!(
                "chunk {} received after transfer already complete",
                chunk.index
            )));
        }
        if chunk.index >= chunk.total_count {
            return Err(SyncError::MalformedChunk(format!(
                "index {} outside [0, {})",
                chunk.index, chunk.total_count
            )));
        }
        if chunk.total_count != self.expected {
            return Err(SyncError::MalformedChunk(format!(
                "chunk declares {} total, session expects {}",
                chunk.total_count, self.expected
            )));
        }
        if chunk.index != self.received {
            return Err(SyncError::ProtocolViolation(format!(
                "chunk {} arrived out of order, expected {}",
                chunk.index, self.received
            )));
        }

        self.buffer.extend_from_slice(&chunk.payload);
        self.received += 1;
        debug!(
            received = self.received,
            expected = self.expected,
            bytes = self.buffer.len(),
            "Chunk accepted"
        );

        if self.received == self.expected {
            Ok(ChunkOutcome::Complete(std::mem::take(&mut self.buffer)))
        } else {
            Ok(ChunkOutcome::InProgress {
                received: self.received,
            })
        }
    }

    /// Chunks expected in total
    pub fn expected(&self) -> u32 {
        self.expected
    }

    /// Chunks accepted so far
    pub fn received(&self) -> u32 {
        self.received
    }
}
