//! Protocol module - wire format and request/response codec.
//!
//! This module implements the trapper protocol framing:
//! - 13-byte header encoding and validation
//! - Request envelope serialization
//! - Response parsing

mod codec;
mod wire_format;

pub use codec::{decode_response, encode_request, Request, SENDER_DATA};
pub use wire_format::{declared_length, frame_payload, has_magic, HEADER_SIZE, MAGIC};
