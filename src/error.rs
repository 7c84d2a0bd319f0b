//! Error types for zabbix-sender.

use std::time::Duration;

use thiserror::Error;

/// Main error type for all sender operations.
///
/// Every network and protocol failure is recoverable: `send` restores the
/// snapshot to the pending queue before returning the error, so the caller
/// can simply retry.
#[derive(Debug, Error)]
pub enum SenderError {
    /// I/O error during connect, write or read.
    #[error("connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The SOCKS proxy refused or failed the CONNECT handshake.
    #[error("proxy handshake failed: {0}")]
    Proxy(String),

    /// Deadline elapsed before the exchange completed.
    #[error("socket timed out after {0:?}")]
    TimedOut(Duration),

    /// Remote closed the connection without sending any bytes.
    ///
    /// Happens when the collector is not the active node in a cluster.
    #[error("got empty response from server")]
    EmptyResponse,

    /// Received bytes that do not start with the protocol magic.
    #[error("got invalid response from server")]
    InvalidResponse,
}

/// Result type alias using SenderError.
pub type Result<T> = std::result::Result<T, SenderError>;
