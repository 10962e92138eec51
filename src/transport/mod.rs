//! Channel transport between host and companion
//!
//! Abstraction over the bidirectional, message-size-limited request/reply
//! link. `protocol` defines the JSON message schema, `channel` the transport
//! trait both sync roles are written against, and `link` an in-memory duplex
//! endpoint pair used for loopback wiring and tests.

pub mod channel;
pub mod link;
pub mod protocol;

pub use channel::{ChannelTransport, Inbound, Responder};
pub use link::{link_pair, LinkEndpoint};
pub use protocol::{
    parse_reply, parse_request, serialize_reply, serialize_request, Reply, Request,
    PROTOCOL_VERSION,
};
