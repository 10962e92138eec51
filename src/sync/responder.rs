//! Sync Responder (host side)
//!
//! Answers companion data requests from the shared store, refreshing
//! through the injected upstream provider when the local entry is missing
//! or stale, and choosing single-message or chunked delivery. Each inbound
//! request runs in its own task so one stalled transfer cannot block
//! another caller.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::config::SyncConfig;
use crate::errors::SyncError;
use crate::model::CacheEntry;
use crate::store::{CacheMiss, SharedCacheStore};
use crate::transfer::{encode, Chunk, Encoded};
use crate::transport::{ChannelTransport, Inbound, Reply, Request, Responder};

/// Upstream data-provider seam: fetches a fresh snapshot when the host's
/// cache cannot satisfy a request. The actual HTTP fetch lives outside this
/// crate.
#[async_trait]
pub trait SnapshotProvider: Send + Sync {
    async fn refresh(&self) -> Result<CacheEntry, SyncError>;
}

/// Host-side request handler
pub struct SyncResponder<T, P> {
    store: Arc<SharedCacheStore>,
    transport: Arc<T>,
    provider: Arc<P>,
    config: SyncConfig,
}

impl<T, P> SyncResponder<T, P>
where
    T: ChannelTransport + 'static,
    P: SnapshotProvider + 'static,
{
    pub fn new(
        store: Arc<SharedCacheStore>,
        transport: Arc<T>,
        provider: Arc<P>,
        config: SyncConfig,
    ) -> Self {
        Self {
            store,
            transport,
            provider,
            config,
        }
    }

    /// Serve inbound requests until the link closes
    pub async fn serve(&self) {
        info!("Sync responder serving");
        while let Some(inbound) = self.transport.recv().await {
            let store = Arc::clone(&self.store);
            let transport = Arc::clone(&self.transport);
            let provider = Arc::clone(&self.provider);
            let config = self.config.clone();
            tokio::spawn(async move {
                handle_request(store, transport, provider, config, inbound).await;
            });
        }
        debug!("Link closed, responder stopped");
    }
}

/// Dispatch one inbound request
async fn handle_request<T, P>(
    store: Arc<SharedCacheStore>,
    transport: Arc<T>,
    provider: Arc<P>,
    config: SyncConfig,
    inbound: Inbound,
) where
    T: ChannelTransport,
    P: SnapshotProvider,
{
    let (request, responder) = inbound.into_parts();
    match request {
        Request::RequestData { chunk_size } => {
            respond_with_snapshot(store, transport, provider, config, chunk_size, responder).await;
        }
        Request::GetData => {
            respond_with_snapshot(store, transport, provider, config, None, responder).await;
        }
        other => {
            // startTransfer / chunk flow toward the companion, never here
            debug!(request = ?other, "Request the host cannot service");
            responder.respond(Reply::Unknown);
        }
    }
}

/// Load (or refresh) the snapshot and deliver it inline or chunked
async fn respond_with_snapshot<T, P>(
    store: Arc<SharedCacheStore>,
    transport: Arc<T>,
    provider: Arc<P>,
    config: SyncConfig,
    requested_chunk_size: Option<usize>,
    responder: Responder,
) where
    T: ChannelTransport,
    P: SnapshotProvider,
{
    let entry = match load_or_refresh(&store, provider.as_ref(), &config).await {
        Ok(entry) => entry,
        Err(err) => {
            error!(error = %err, "Unable to produce a snapshot for the peer");
            responder.respond(Reply::Error {
                message: err.to_string(),
            });
            return;
        }
    };

    let limit = requested_chunk_size
        .unwrap_or(config.max_chunk_size)
        .clamp(1, config.max_chunk_size);

    match encode(&entry, limit) {
        Ok(Encoded::Single(bytes)) => {
            debug!(size = bytes.len(), "Replying with inline snapshot");
            responder.respond(Reply::Ready {
                chunks: None,
                data: Some(bytes),
            });
        }
        Ok(Encoded::Chunked(chunks)) => {
            let count = chunks.len() as u32;
            info!(
                chunks = count,
                chunk_size = limit,
                "Snapshot exceeds message limit, starting chunked transfer"
            );
            responder.respond(Reply::Ready {
                chunks: Some(count),
                data: None,
            });
            push_chunks(transport.as_ref(), chunks, config.inter_chunk_delay).await;
        }
        Err(err) => {
            error!(error = %err, "Failed to encode snapshot");
            responder.respond(Reply::Error {
                message: err.to_string(),
            });
        }
    }
}

/// Freshest entry from the store, refetching upstream on a miss
///
/// A failed refresh falls back to a stale entry when one exists; the
/// companion sees the capture timestamp and can degrade on its own terms.
async fn load_or_refresh<P: SnapshotProvider>(
    store: &SharedCacheStore,
    provider: &P,
    config: &SyncConfig,
) -> Result<CacheEntry, SyncError> {
    let miss = match store.read(1, config.read_retry_delay).await {
        Ok(entry) => return Ok(entry),
        Err(miss) => miss,
    };

    debug!(miss = %miss, "Host cache miss, refreshing upstream");
    match provider.refresh().await {
        Ok(entry) => {
            if let Err(err) = store.write(&entry) {
                warn!(error = %err, "Refreshed snapshot could not be cached");
            }
            Ok(entry)
        }
        Err(refresh_err) => match miss {
            CacheMiss::Stale(entry) => {
                warn!(error = %refresh_err, "Refresh failed, serving stale snapshot");
                Ok(*entry)
            }
            CacheMiss::Empty => Err(refresh_err),
        },
    }
}

/// Announce the transfer, then push chunks in order with the pacing delay.
/// Ack failures are logged and skipped; delivery problems surface on the
/// companion side.
async fn push_chunks<T: ChannelTransport>(transport: &T, chunks: Vec<Chunk>, delay: Duration) {
    let total = chunks.len() as u32;

    match transport
        .send_request(Request::StartTransfer { chunk_count: total })
        .await
    {
        Ok(Reply::Received { .. }) => {}
        Ok(other) => {
            warn!(reply = ?other, "Peer rejected transfer start");
            return;
        }
        Err(err) => {
            warn!(error = %err, "Could not announce transfer");
            return;
        }
    }

    for chunk in chunks {
        if chunk.index > 0 {
            sleep(delay).await;
        }
        let index = chunk.index;
        match transport.send_chunk(chunk).await {
            Ok(()) => debug!(index = index, total = total, "Chunk acknowledged"),
            Err(err) => warn!(index = index, error = %err, "Chunk send failed"),
        }
    }
}
