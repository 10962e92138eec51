//! Sync roles
//!
//! The companion-side orchestrator (try local cache, then the peer, with
//! bounded retries) and the host-side responder (answer data requests,
//! choosing single-message or chunked delivery).

pub mod orchestrator;
pub mod responder;

pub use orchestrator::{SyncOrchestrator, SyncOutcome};
pub use responder::{SnapshotProvider, SyncResponder};
