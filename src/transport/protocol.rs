//! Sync Protocol Definitions
//!
//! JSON message schema for the host/companion request-reply link. Requests
//! are tagged by `type`, replies by `status`; binary chunk payloads travel
//! as base64 strings. Messages are newline-delimited when framed onto a
//! byte-stream transport.

use serde::{Deserialize, Serialize};

/// Protocol version for future compatibility
pub const PROTOCOL_VERSION: u32 = 1;

/// Messages initiating one round trip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Request {
    /// Companion asks the host for the latest snapshot
    #[serde(rename_all = "camelCase")]
    RequestData {
        /// Largest single message the companion will accept
        #[serde(default, skip_serializing_if = "Option::is_none")]
        chunk_size: Option<usize>,
    },
    /// Host announces an imminent chunked transfer so the receiver can
    /// allocate a session before any chunk arrives
    #[serde(rename_all = "camelCase")]
    StartTransfer {
        /// Chunks the transfer will carry
        chunk_count: u32,
    },
    /// One fragment of a chunked transfer
    #[serde(rename_all = "camelCase")]
    Chunk {
        /// Position of this fragment
        index: u32,
        /// Total fragments in the transfer
        total_count: u32,
        /// Fragment bytes, base64 on the wire
        #[serde(with = "b64")]
        data: Vec<u8>,
    },
    /// Legacy single-shot fetch; handled like `requestData` with defaults
    GetData,
}

/// Replies to one round trip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum Reply {
    /// Request accepted: either the payload inline (small snapshots) or the
    /// chunk count of the transfer about to start
    #[serde(rename_all = "camelCase")]
    Ready {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        chunks: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none", with = "opt_b64")]
        data: Option<Vec<u8>>,
    },
    /// Acknowledgement of a start-transfer message or a chunk
    #[serde(rename_all = "camelCase")]
    Received {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        index: Option<u32>,
    },
    /// Request failed on the peer
    #[serde(rename_all = "camelCase")]
    Error { message: String },
    /// Peer did not understand the request
    Unknown,
}

/// Parse a JSON request from bytes
pub fn parse_request(data: &[u8]) -> Result<Request, serde_json::Error> {
    serde_json::from_slice(data)
}

/// Serialize a request to newline-delimited JSON bytes
pub fn serialize_request(request: &Request) -> Result<Vec<u8>, serde_json::Error> {
    let mut json = serde_json::to_vec(request)?;
    json.push(b'\n');
    Ok(json)
}

/// Parse a JSON reply from bytes
pub fn parse_reply(data: &[u8]) -> Result<Reply, serde_json::Error> {
    serde_json::from_slice(data)
}

/// Serialize a reply to newline-delimited JSON bytes
pub fn serialize_reply(reply: &Reply) -> Result<Vec<u8>, serde_json::Error> {
    let mut json = serde_json::to_vec(reply)?;
    json.push(b'\n');
    Ok(json)
}

/// Base64 for required byte fields
mod b64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        STANDARD.encode(bytes).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

/// Base64 for optional byte fields
mod opt_b64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(
        bytes: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(b) => STANDARD.encode(b).serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        let encoded: Option<String> = Option::deserialize(deserializer)?;
        match encoded {
            Some(s) => STANDARD
                .decode(s.as_bytes())
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}
