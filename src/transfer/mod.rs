//! Chunked transfer codec
//!
//! Splits a serialized snapshot into ordered, size-bounded chunks and
//! reassembles them on the companion. Delivery reliability and ordering are
//! the transport's concern; this module owns only the split/reassembly
//! bookkeeping and the per-transfer state machine.

pub mod codec;
pub mod state;

pub use codec::{decode_entry, encode, Chunk, ChunkOutcome, Encoded, TransferSession};
pub use state::{TransferState, TransferStateMachine};
