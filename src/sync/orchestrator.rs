//! Sync Orchestrator (companion side)
//!
//! Produces a best-effort fresh snapshot: local cache first, then the peer,
//! retried with exponential backoff. Every attempt is bounded by an overall
//! transfer timeout; a timed-out transfer is abandoned client-side without
//! notifying the peer, so a late chunk may still arrive afterwards and is
//! rejected when it does.

use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::errors::SyncError;
use crate::model::{unix_now, CacheEntry};
use crate::retry::retry_with_backoff;
use crate::store::{CacheMiss, SharedCacheStore};
use crate::transfer::{
    decode_entry, Chunk, ChunkOutcome, TransferSession, TransferState, TransferStateMachine,
};
use crate::transport::{ChannelTransport, Reply, Request};

/// What a sync ultimately produced
#[derive(Debug)]
pub enum SyncOutcome {
    /// A snapshot within its TTL
    Fresh(CacheEntry),
    /// Every attempt failed, but a stale entry exists; callers can show it
    /// with a warning instead of an empty state
    Degraded {
        entry: CacheEntry,
        error: SyncError,
    },
}

impl SyncOutcome {
    pub fn entry(&self) -> &CacheEntry {
        match self {
            SyncOutcome::Fresh(entry) => entry,
            SyncOutcome::Degraded { entry, .. } => entry,
        }
    }

    pub fn into_entry(self) -> CacheEntry {
        match self {
            SyncOutcome::Fresh(entry) => entry,
            SyncOutcome::Degraded { entry, .. } => entry,
        }
    }

    pub fn is_fresh(&self) -> bool {
        matches!(self, SyncOutcome::Fresh(_))
    }
}

/// Companion-side sync driver
pub struct SyncOrchestrator<T: ChannelTransport> {
    store: Arc<SharedCacheStore>,
    transport: Arc<T>,
    config: SyncConfig,
    /// State path of the most recent transfer attempt, for diagnostics
    last_transfer: StdMutex<Vec<TransferState>>,
}

impl<T: ChannelTransport> SyncOrchestrator<T> {
    pub fn new(store: Arc<SharedCacheStore>, transport: Arc<T>, config: SyncConfig) -> Self {
        Self {
            store,
            transport,
            config,
            last_transfer: StdMutex::new(Vec::new()),
        }
    }

    /// Best-effort fresh snapshot, short-circuiting on first success
    ///
    /// Tries the local store, then the peer, up to `config.retry.max_attempts`
    /// times with exponential backoff. On exhaustion, a stale entry found
    /// along the way is returned as a degraded outcome; otherwise the
    /// terminal error is `CacheEmpty` or `Unreachable`.
    pub async fn fetch_snapshot(&self) -> Result<SyncOutcome, SyncError> {
        let stale_fallback: StdMutex<Option<CacheEntry>> = StdMutex::new(None);

        let this = self;
        let fallback = &stale_fallback;
        let result = retry_with_backoff("snapshot-sync", &self.config.retry, move || {
            this.attempt(fallback)
        })
        .await;

        match result {
            Ok(entry) => {
                info!(
                    records = entry.snapshot.records.len(),
                    captured_at = entry.captured_at,
                    "Sync produced a fresh snapshot"
                );
                Ok(SyncOutcome::Fresh(entry))
            }
            Err(err) => {
                let error = terminal_error(err);
                match stale_fallback.lock().unwrap().take() {
                    Some(entry) => {
                        warn!(
                            error = %error,
                            captured_at = entry.captured_at,
                            "Sync failed, falling back to stale snapshot"
                        );
                        Ok(SyncOutcome::Degraded { entry, error })
                    }
                    None => Err(error),
                }
            }
        }
    }

    /// One attempt: local read, then a peer transfer bounded by the overall
    /// transfer timeout
    async fn attempt(
        &self,
        stale_fallback: &StdMutex<Option<CacheEntry>>,
    ) -> Result<CacheEntry, SyncError> {
        match self
            .store
            .read(self.config.read_retries, self.config.read_retry_delay)
            .await
        {
            Ok(entry) => {
                debug!("Local cache satisfied the sync");
                return Ok(entry);
            }
            Err(CacheMiss::Stale(entry)) => {
                debug!(
                    captured_at = entry.captured_at,
                    "Local cache stale, asking peer"
                );
                remember_stale(stale_fallback, *entry);
            }
            Err(CacheMiss::Empty) => debug!("Local cache empty, asking peer"),
        }

        if !self.transport.is_reachable() {
            return Err(SyncError::Unreachable);
        }

        let mut machine = TransferStateMachine::new();
        let result = match timeout(
            self.config.transfer_timeout,
            self.transfer_from_peer(&mut machine),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                // The peer is not told the session was abandoned; a stray
                // late chunk may arrive against the next attempt
                warn!(
                    timeout_ms = self.config.transfer_timeout.as_millis() as u64,
                    "Transfer attempt exceeded its deadline"
                );
                Err(SyncError::Timeout)
            }
        };

        if result.is_err()
            && !matches!(
                machine.state(),
                TransferState::Delivered | TransferState::Aborted
            )
        {
            let _ = machine.advance(TransferState::Aborted);
        }
        *self.last_transfer.lock().unwrap() = machine.history().to_vec();

        // A host whose upstream is down serves its own stale entry; judge
        // freshness here rather than trusting delivery
        result.and_then(|entry| {
            if entry.is_fresh(self.store.ttl(), unix_now()) {
                Ok(entry)
            } else {
                warn!(
                    captured_at = entry.captured_at,
                    "Peer delivered an expired snapshot"
                );
                remember_stale(stale_fallback, entry);
                Err(SyncError::CacheStale)
            }
        })
    }

    /// Request the snapshot and drive the reply to delivery
    async fn transfer_from_peer(
        &self,
        machine: &mut TransferStateMachine,
    ) -> Result<CacheEntry, SyncError> {
        machine.advance(TransferState::AwaitingStartAck)?;

        let reply = self
            .transport
            .send_request(Request::RequestData {
                chunk_size: Some(self.config.max_chunk_size),
            })
            .await?;

        match reply {
            Reply::Ready {
                data: Some(bytes), ..
            } => {
                machine.advance(TransferState::Reassembling)?;
                let entry = decode_entry(&bytes)?;
                self.store_received(&entry);
                machine.advance(TransferState::Delivered)?;
                Ok(entry)
            }
            Reply::Ready {
                chunks: Some(expected),
                data: None,
            } => self.receive_chunks(machine, expected).await,
            Reply::Ready {
                chunks: None,
                data: None,
            } => Err(SyncError::ProtocolViolation(
                "ready reply carried neither payload nor chunk count".into(),
            )),
            Reply::Error { message } => Err(SyncError::PeerError(message)),
            other => Err(SyncError::ProtocolViolation(format!(
                "unexpected reply to data request: {:?}",
                other
            ))),
        }
    }

    /// Accept the start-transfer message and the chunk stream
    async fn receive_chunks(
        &self,
        machine: &mut TransferStateMachine,
        expected: u32,
    ) -> Result<CacheEntry, SyncError> {
        machine.advance(TransferState::ReceivingChunks)?;
        let mut session: Option<TransferSession> = None;

        loop {
            let inbound = self
                .transport
                .recv()
                .await
                .ok_or(SyncError::Unreachable)?;
            let (request, responder) = inbound.into_parts();

            match request {
                Request::StartTransfer { chunk_count } => {
                    if session.is_some() {
                        warn!("New start-transfer message discards incomplete session");
                    }
                    if chunk_count != expected {
                        responder.respond(Reply::Error {
                            message: format!(
                                "ready declared {} chunks, start declared {}",
                                expected, chunk_count
                            ),
                        });
                        return Err(SyncError::ProtocolViolation(format!(
                            "start transfer count {} disagrees with ready count {}",
                            chunk_count, expected
                        )));
                    }
                    session = Some(TransferSession::begin(chunk_count));
                    responder.respond(Reply::Received { index: None });
                }
                Request::Chunk {
                    index,
                    total_count,
                    data,
                } => {
                    let Some(active) = session.as_mut() else {
                        // Likely a late chunk from an abandoned transfer
                        warn!(index = index, "Rejecting chunk with no open session");
                        responder.respond(Reply::Error {
                            message: "no active transfer session".into(),
                        });
                        continue;
                    };

                    let chunk = Chunk {
                        index,
                        total_count,
                        payload: data,
                    };
                    match active.receive(chunk) {
                        Ok(ChunkOutcome::InProgress { received }) => {
                            debug!(received = received, expected = expected, "Chunk stored");
                            responder.respond(Reply::Received { index: Some(index) });
                        }
                        Ok(ChunkOutcome::Complete(bytes)) => {
                            responder.respond(Reply::Received { index: Some(index) });
                            machine.advance(TransferState::Reassembling)?;
                            let entry = decode_entry(&bytes)?;
                            self.store_received(&entry);
                            machine.advance(TransferState::Delivered)?;
                            return Ok(entry);
                        }
                        Err(err) => {
                            responder.respond(Reply::Error {
                                message: err.to_string(),
                            });
                            // Aborts this session only; the outer retry loop
                            // decides whether to try again
                            return Err(err);
                        }
                    }
                }
                other => {
                    debug!(request = ?other, "Unexpected request during transfer");
                    responder.respond(Reply::Unknown);
                }
            }
        }
    }

    /// Cache a delivered snapshot; a write failure downgrades to a warning
    /// since the snapshot is already in hand
    fn store_received(&self, entry: &CacheEntry) {
        if let Err(err) = self.store.write(entry) {
            warn!(error = %err, "Delivered snapshot could not be cached");
        }
    }

    /// State path of the most recent transfer attempt
    pub fn last_transfer_states(&self) -> Vec<TransferState> {
        self.last_transfer.lock().unwrap().clone()
    }
}

/// Hold on to the freshest stale entry seen across attempts, whether it
/// came from the local store or from the peer
fn remember_stale(slot: &StdMutex<Option<CacheEntry>>, entry: CacheEntry) {
    let mut slot = slot.lock().unwrap();
    let is_fresher = slot
        .as_ref()
        .map(|held| entry.captured_at > held.captured_at)
        .unwrap_or(true);
    if is_fresher {
        *slot = Some(entry);
    }
}

/// Collapse an exhausted attempt's error into the surfaced taxonomy:
/// transport and protocol failures read as an unreachable peer, cache
/// misses as an empty cache, and a peer-reported failure means the peer had
/// nothing for us.
fn terminal_error(err: SyncError) -> SyncError {
    match err {
        SyncError::CacheEmpty | SyncError::CacheStale | SyncError::PeerError(_) => {
            SyncError::CacheEmpty
        }
        SyncError::Unreachable
        | SyncError::Timeout
        | SyncError::MalformedChunk(_)
        | SyncError::ProtocolViolation(_)
        | SyncError::LoadFailed(_)
        | SyncError::InvalidSnapshot(_) => SyncError::Unreachable,
        other => other,
    }
}
