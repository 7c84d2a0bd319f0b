//! Wire format encoding and decoding.
//!
//! Implements the 13-byte trapper header:
//! ```text
//! ┌───────────────┬───────────┬───────────┐
//! │ Magic         │ Length    │ Reserved  │
//! │ 5 bytes       │ 4 bytes   │ 4 bytes   │
//! │ "ZBXD" + 0x01 │ uint32 LE │ all zero  │
//! └───────────────┴───────────┴───────────┘
//! ```
//!
//! Length is the byte count of the JSON payload that follows the header.
//! This layout is a compatibility contract with the collector and must be
//! reproduced bit-for-bit. Requests and responses use identical framing.

/// Fixed 5-byte prefix identifying a valid frame: `"ZBXD"` plus version 1.
pub const MAGIC: [u8; 5] = *b"ZBXD\x01";

/// Header size in bytes (fixed, exactly 13).
pub const HEADER_SIZE: usize = 13;

/// Wrap a serialized payload in a complete wire frame.
///
/// # Example
///
/// ```
/// use zabbix_sender::protocol::{frame_payload, HEADER_SIZE};
///
/// let frame = frame_payload(b"{}");
/// assert_eq!(frame.len(), HEADER_SIZE + 2);
/// assert_eq!(&frame[..4], b"ZBXD");
/// ```
pub fn frame_payload(payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
    frame.extend_from_slice(&MAGIC);
    frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    frame.extend_from_slice(&[0u8; 4]);
    frame.extend_from_slice(payload);
    frame
}

/// Check that a buffer begins with the protocol magic.
#[inline]
pub fn has_magic(buf: &[u8]) -> bool {
    buf.len() >= MAGIC.len() && buf[..MAGIC.len()] == MAGIC
}

/// Read the payload length a frame declares in its header.
///
/// Returns `None` if the buffer is too short to contain the length field.
/// The sender does not enforce this value against the actual payload size;
/// it is read for diagnostics only.
pub fn declared_length(buf: &[u8]) -> Option<u32> {
    let bytes = buf.get(MAGIC.len()..MAGIC.len() + 4)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}
