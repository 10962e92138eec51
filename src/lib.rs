//! wxsync - shared snapshot cache and host/companion sync
//!
//! Keeps a resource-constrained companion process supplied with the latest
//! weather snapshot produced by its host process, over a request/reply
//! channel with a bounded message size and intermittent reachability.
//!
//! The pieces, leaves first:
//! - [`store`]: the TTL-governed shared cache, persisted across an ordered
//!   list of candidate storage locations with atomic writes.
//! - [`transfer`]: the chunked transfer codec that splits a serialized
//!   snapshot into size-bounded fragments and reassembles them.
//! - [`transport`]: the message schema and the request/reply channel
//!   abstraction linking the two processes.
//! - [`sync`]: the companion-side orchestrator (cache first, then the peer,
//!   bounded retries with backoff) and the host-side responder.
//!
//! This crate is a library consumed by presentation code; the upstream
//! forecast fetch, UI, and background scheduling live elsewhere.

pub mod config;
pub mod errors;
pub mod model;
pub mod retry;
pub mod store;
pub mod sync;
pub mod transfer;
pub mod transport;

pub use config::SyncConfig;
pub use errors::SyncError;
pub use model::{CacheEntry, HourlyRecord, Snapshot};
pub use retry::RetryPolicy;
pub use store::{SharedCacheStore, StorageLocation};
pub use sync::{SnapshotProvider, SyncOrchestrator, SyncOutcome, SyncResponder};
pub use transport::{ChannelTransport, LinkEndpoint};
