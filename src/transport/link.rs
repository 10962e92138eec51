//! In-Memory Duplex Link
//!
//! Two crossed mpsc channels standing in for the physical host/companion
//! link. Delivery is in order per direction, each message is one
//! request/reply round trip, and reachability is a shared flag either end
//! can flip (the real link drops whenever the peer goes out of range).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tokio::time::timeout;
use tracing::debug;

use crate::errors::SyncError;
use crate::transport::channel::{ChannelTransport, Inbound};
use crate::transport::protocol::{Reply, Request};

/// Messages buffered per direction before senders wait
const LINK_CAPACITY: usize = 32;

/// Default bound on one round trip
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// One end of the duplex link
pub struct LinkEndpoint {
    /// Label for logs ("host" / "companion")
    label: &'static str,
    outbound: mpsc::Sender<Inbound>,
    inbound: Mutex<mpsc::Receiver<Inbound>>,
    reachable: Arc<AtomicBool>,
    request_timeout: Duration,
}

/// Create a connected endpoint pair: `(host, companion)`
pub fn link_pair() -> (LinkEndpoint, LinkEndpoint) {
    let (to_companion, from_host) = mpsc::channel(LINK_CAPACITY);
    let (to_host, from_companion) = mpsc::channel(LINK_CAPACITY);
    let reachable = Arc::new(AtomicBool::new(true));

    let host = LinkEndpoint {
        label: "host",
        outbound: to_companion,
        inbound: Mutex::new(from_companion),
        reachable: Arc::clone(&reachable),
        request_timeout: DEFAULT_REQUEST_TIMEOUT,
    };
    let companion = LinkEndpoint {
        label: "companion",
        outbound: to_host,
        inbound: Mutex::new(from_host),
        reachable,
        request_timeout: DEFAULT_REQUEST_TIMEOUT,
    };
    (host, companion)
}

impl LinkEndpoint {
    /// Flip the shared reachability flag (both ends observe the change)
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
        debug!(endpoint = self.label, reachable = reachable, "Link state changed");
    }

    /// Override the per-round-trip deadline
    pub fn set_request_timeout(&mut self, request_timeout: Duration) {
        self.request_timeout = request_timeout;
    }
}

#[async_trait]
impl ChannelTransport for LinkEndpoint {
    fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }

    async fn send_request(&self, request: Request) -> Result<Reply, SyncError> {
        if !self.is_reachable() {
            return Err(SyncError::Unreachable);
        }

        let (inbound, reply_rx) = Inbound::new(request);
        self.outbound
            .send(inbound)
            .await
            .map_err(|_| SyncError::Unreachable)?;

        match timeout(self.request_timeout, reply_rx).await {
            Ok(Ok(reply)) => Ok(reply),
            // Peer dropped the request without replying
            Ok(Err(_)) => Err(SyncError::Unreachable),
            Err(_) => {
                debug!(endpoint = self.label, "Round trip timed out");
                Err(SyncError::Timeout)
            }
        }
    }

    async fn recv(&self) -> Option<Inbound> {
        self.inbound.lock().await.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_round_trip_between_endpoints() {
        let (host, companion) = link_pair();

        let server = tokio::spawn(async move {
            let inbound = host.recv().await.unwrap();
            let (request, responder) = inbound.into_parts();
            assert_eq!(request, Request::GetData);
            responder.respond(Reply::Received { index: None });
        });

        let reply = companion.send_request(Request::GetData).await.unwrap();
        assert_eq!(reply, Reply::Received { index: None });
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_unreachable_link_rejects_sends() {
        let (host, companion) = link_pair();
        companion.set_reachable(false);

        // Both ends observe the shared flag
        assert!(!host.is_reachable());
        let err = companion.send_request(Request::GetData).await.unwrap_err();
        assert!(matches!(err, SyncError::Unreachable));
    }

    #[tokio::test]
    async fn test_unanswered_request_times_out() {
        let (host, mut companion) = link_pair();
        companion.set_request_timeout(Duration::from_millis(20));

        // Accept the message but never reply
        let silent = tokio::spawn(async move {
            let _held = host.recv().await;
            tokio::time::sleep(Duration::from_secs(1)).await;
        });

        let err = companion.send_request(Request::GetData).await.unwrap_err();
        assert!(matches!(err, SyncError::Timeout));
        silent.abort();
    }

    #[tokio::test]
    async fn test_closed_peer_is_unreachable() {
        let (host, companion) = link_pair();
        drop(host);

        let err = companion.send_request(Request::GetData).await.unwrap_err();
        assert!(matches!(err, SyncError::Unreachable));
    }

    #[tokio::test]
    async fn test_messages_delivered_in_send_order() {
        let (host, companion) = link_pair();

        let sender = tokio::spawn(async move {
            for index in 0..5u32 {
                let reply = host
                    .send_request(Request::StartTransfer { chunk_count: index })
                    .await
                    .unwrap();
                assert_eq!(reply, Reply::Received { index: Some(index) });
            }
        });

        for expected in 0..5u32 {
            let inbound = companion.recv().await.unwrap();
            let (request, responder) = inbound.into_parts();
            assert_eq!(
                request,
                Request::StartTransfer {
                    chunk_count: expected
                }
            );
            responder.respond(Reply::Received {
                index: Some(expected),
            });
        }
        sender.await.unwrap();
    }
}
