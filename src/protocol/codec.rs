//! Request/response codec.
//!
//! Pure encode/decode of the trapper protocol, no I/O. A batch of items is
//! wrapped in the `"sender data"` envelope, serialized to JSON and framed
//! with the 13-byte header; a response is validated against the magic and
//! its payload parsed from byte offset 13.

use serde::Serialize;
use serde_json::Value;

use super::wire_format::{declared_length, frame_payload, has_magic, HEADER_SIZE};
use crate::error::{Result, SenderError};
use crate::queue::{Item, Timestamp};

/// The request type the collector expects for metric submission.
pub const SENDER_DATA: &str = "sender data";

/// Request envelope serialized into the frame payload.
///
/// `clock`/`ns` carry the request-level timestamp, sampled once for the
/// whole batch; they are absent when timestamping is disabled.
#[derive(Debug, Serialize)]
pub struct Request<'a> {
    /// Always [`SENDER_DATA`].
    pub request: &'static str,
    /// The snapshot of items being submitted.
    pub data: &'a [Item],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clock: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ns: Option<i64>,
}

impl<'a> Request<'a> {
    /// Build the envelope for a snapshot, with an optional request-level
    /// timestamp.
    pub fn new(data: &'a [Item], stamp: Option<Timestamp>) -> Self {
        Self {
            request: SENDER_DATA,
            data,
            clock: stamp.map(|s| s.clock),
            ns: stamp.and_then(|s| s.ns),
        }
    }
}

/// Encode a batch of items into a complete wire frame.
///
/// Deterministic given identical items and clock reading.
pub fn encode_request(items: &[Item], stamp: Option<Timestamp>) -> Result<Vec<u8>> {
    let payload = serde_json::to_vec(&Request::new(items, stamp))?;
    Ok(frame_payload(&payload))
}

/// Decode a collector response.
///
/// Fails with [`SenderError::EmptyResponse`] if no bytes were received and
/// with [`SenderError::InvalidResponse`] if the first 5 bytes are not the
/// magic sequence. Otherwise the bytes from offset 13 onward are parsed as
/// JSON. The declared length field is not enforced against the actual
/// payload size; the remote is trusted here, and a mismatch is only logged.
pub fn decode_response(bytes: &[u8]) -> Result<Value> {
    if bytes.is_empty() {
        return Err(SenderError::EmptyResponse);
    }

    if !has_magic(bytes) {
        return Err(SenderError::InvalidResponse);
    }

    if let Some(declared) = declared_length(bytes) {
        let actual = bytes.len().saturating_sub(HEADER_SIZE);
        if declared as usize != actual {
            tracing::debug!(
                "response declares {} payload bytes but carries {}",
                declared,
                actual
            );
        }
    }

    let payload = bytes.get(HEADER_SIZE..).unwrap_or(&[]);
    Ok(serde_json::from_slice(payload)?)
}
