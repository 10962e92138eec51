//! Channel Transport Abstraction
//!
//! The seam both sync roles are written against: reachability, one
//! request/reply round trip, and an inbound stream of peer-initiated
//! requests. Chunk sends are ordinary round trips; in-order delivery is a
//! transport guarantee the codec relies on.

use async_trait::async_trait;
use tokio::sync::oneshot;
use tracing::debug;

use crate::errors::SyncError;
use crate::transfer::Chunk;
use crate::transport::protocol::{Reply, Request};

/// Bidirectional, message-size-limited request/reply link to the peer
#[async_trait]
pub trait ChannelTransport: Send + Sync {
    /// Current peer connectability; may change asynchronously, so poll
    /// before starting a transfer
    fn is_reachable(&self) -> bool;

    /// One request/reply round trip
    async fn send_request(&self, request: Request) -> Result<Reply, SyncError>;

    /// Next peer-initiated request, or `None` when the link is closed
    async fn recv(&self) -> Option<Inbound>;

    /// Send one chunk and interpret its acknowledgement
    async fn send_chunk(&self, chunk: Chunk) -> Result<(), SyncError> {
        let reply = self
            .send_request(Request::Chunk {
                index: chunk.index,
                total_count: chunk.total_count,
                data: chunk.payload,
            })
            .await?;
        match reply {
            Reply::Received { .. } => Ok(()),
            Reply::Error { message } => Err(SyncError::PeerError(message)),
            other => Err(SyncError::ProtocolViolation(format!(
                "unexpected reply to chunk: {:?}",
                other
            ))),
        }
    }
}

/// A peer-initiated request paired with its one-shot reply slot
#[derive(Debug)]
pub struct Inbound {
    request: Request,
    reply_tx: oneshot::Sender<Reply>,
}

impl Inbound {
    /// Create an inbound request; the transport awaits the returned receiver
    /// for the reply
    pub fn new(request: Request) -> (Self, oneshot::Receiver<Reply>) {
        let (reply_tx, reply_rx) = oneshot::channel();
        (Self { request, reply_tx }, reply_rx)
    }

    /// Split into the request and its reply handle
    pub fn into_parts(self) -> (Request, Responder) {
        (
            self.request,
            Responder {
                reply_tx: self.reply_tx,
            },
        )
    }

    /// The request awaiting a reply
    pub fn request(&self) -> &Request {
        &self.request
    }
}

/// Reply handle for one inbound request
#[derive(Debug)]
pub struct Responder {
    reply_tx: oneshot::Sender<Reply>,
}

impl Responder {
    /// Send the reply; the requester may already have given up, which is
    /// not an error here
    pub fn respond(self, reply: Reply) {
        if self.reply_tx.send(reply).is_err() {
            debug!("Requester gone before reply was sent");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_inbound_carries_reply_back() {
        let (inbound, reply_rx) = Inbound::new(Request::GetData);
        let (request, responder) = inbound.into_parts();
        assert_eq!(request, Request::GetData);

        responder.respond(Reply::Unknown);
        assert_eq!(reply_rx.await.unwrap(), Reply::Unknown);
    }

    #[tokio::test]
    async fn test_respond_tolerates_dropped_requester() {
        let (inbound, reply_rx) = Inbound::new(Request::GetData);
        drop(reply_rx);
        let (_, responder) = inbound.into_parts();
        // Must not panic
        responder.respond(Reply::Unknown);
    }
}
