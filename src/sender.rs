//! Sender - the one-shot batch submission state machine.
//!
//! A send captures the pending queue as a snapshot and clears it before
//! any I/O, then drives one request/response exchange under a single
//! deadline: connect, write the full frame once, accumulate response
//! bytes until the remote closes. On any failure the snapshot is requeued
//! so the caller can retry without losing or duplicating items; on success
//! the parsed acknowledgement and the snapshot are returned together.
//!
//! `send` borrows the sender mutably, so a second send cannot start while
//! one is outstanding, and each call resolves to exactly one outcome.

use std::time::Duration;

use bytes::BytesMut;
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::{Result, SenderError};
use crate::protocol;
use crate::queue::{Item, ItemQueue, ItemValue};
use crate::transport::{Proxy, Transport};

/// Default collector port.
pub const DEFAULT_PORT: u16 = 10051;

/// Default exchange timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Builder for configuring and creating a [`Sender`].
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use zabbix_sender::Sender;
///
/// let sender = Sender::builder()
///     .host("zabbix.example")
///     .timeout(Duration::from_secs(10))
///     .with_timestamps()
///     .build();
/// assert_eq!(sender.count_items(), 0);
/// ```
pub struct SenderBuilder {
    host: String,
    port: u16,
    timeout: Duration,
    with_timestamps: bool,
    with_ns: bool,
    items_host: Option<String>,
    proxy: Option<Proxy>,
}

impl SenderBuilder {
    /// Create a builder with the default configuration.
    pub fn new() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            timeout: DEFAULT_TIMEOUT,
            with_timestamps: false,
            with_ns: false,
            items_host: None,
            proxy: None,
        }
    }

    /// Collector host. Default: `localhost`.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Collector port. Default: 10051.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Overall deadline for one exchange (connect, write, read).
    /// Default: 5 seconds.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Stamp each queued item and the request envelope with wall-clock
    /// seconds.
    pub fn with_timestamps(mut self) -> Self {
        self.with_timestamps = true;
        self
    }

    /// Stamp with nanosecond precision. Implies [`with_timestamps`].
    ///
    /// [`with_timestamps`]: SenderBuilder::with_timestamps
    pub fn with_ns(mut self) -> Self {
        self.with_ns = true;
        self
    }

    /// Origin host reported for items queued without an explicit host.
    /// Default: the local machine's hostname.
    pub fn items_host(mut self, items_host: impl Into<String>) -> Self {
        self.items_host = Some(items_host.into());
        self
    }

    /// Route the connection through a SOCKS proxy.
    pub fn proxy(mut self, proxy: Proxy) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Build the sender.
    pub fn build(self) -> Sender {
        Sender {
            host: self.host,
            port: self.port,
            timeout: self.timeout,
            items_host: self.items_host.unwrap_or_else(default_items_host),
            transport: match self.proxy {
                Some(proxy) => Transport::Socks(proxy),
                None => Transport::Direct,
            },
            queue: ItemQueue::new(self.with_timestamps, self.with_ns),
        }
    }
}

impl Default for SenderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Local hostname, used as the default item origin.
fn default_items_host() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .unwrap_or_else(|| "localhost".to_string())
}

/// Client for submitting metric batches to a trapper collector.
///
/// Queue readings with [`add_item`]/[`add_host_item`], then [`send`] the
/// whole batch in one exchange. The client instance owns its pending
/// queue for its whole lifetime and stays usable after any failure.
///
/// [`add_item`]: Sender::add_item
/// [`add_host_item`]: Sender::add_host_item
/// [`send`]: Sender::send
pub struct Sender {
    host: String,
    port: u16,
    timeout: Duration,
    items_host: String,
    transport: Transport,
    queue: ItemQueue,
}

impl Sender {
    /// Create a new sender builder.
    pub fn builder() -> SenderBuilder {
        SenderBuilder::new()
    }

    /// Queue a reading against the default origin host.
    pub fn add_item(&mut self, key: impl Into<String>, value: impl Into<ItemValue>) -> &mut Self {
        let host = self.items_host.clone();
        self.queue.push(host, key, value);
        self
    }

    /// Queue a reading for an explicit origin host.
    pub fn add_host_item(
        &mut self,
        host: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<ItemValue>,
    ) -> &mut Self {
        self.queue.push(host, key, value);
        self
    }

    /// Drop all pending items.
    pub fn clear_items(&mut self) -> &mut Self {
        self.queue.clear();
        self
    }

    /// Number of pending items.
    pub fn count_items(&self) -> usize {
        self.queue.len()
    }

    /// Submit all pending items and parse the collector's acknowledgement.
    ///
    /// The queue is snapshot-and-cleared before any I/O, so items queued
    /// while a send is being awaited belong to the next send. On failure
    /// the snapshot is restored behind anything queued meanwhile and the
    /// error is returned; no retry happens internally.
    pub async fn send(&mut self) -> Result<Ack> {
        let snapshot = self.queue.take();
        let stamp = self.queue.stamp();

        let request = match protocol::encode_request(&snapshot, stamp) {
            Ok(frame) => frame,
            Err(e) => {
                self.queue.requeue(snapshot);
                return Err(e);
            }
        };

        let response = match tokio::time::timeout(self.timeout, self.exchange(&request)).await {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(e)) => {
                tracing::warn!("send failed, requeueing {} items: {}", snapshot.len(), e);
                self.queue.requeue(snapshot);
                return Err(e);
            }
            Err(_) => {
                tracing::warn!(
                    "exchange timed out after {:?}, requeueing {} items",
                    self.timeout,
                    snapshot.len()
                );
                self.queue.requeue(snapshot);
                return Err(SenderError::TimedOut(self.timeout));
            }
        };

        match protocol::decode_response(&response) {
            Ok(value) => Ok(Ack {
                response: value,
                items: snapshot,
            }),
            Err(e) => {
                tracing::warn!("bad response, requeueing {} items: {}", snapshot.len(), e);
                self.queue.requeue(snapshot);
                Err(e)
            }
        }
    }

    /// Drive one exchange: connect, write the frame once, then accumulate
    /// response bytes until the remote closes the connection.
    async fn exchange(&self, request: &[u8]) -> Result<Vec<u8>> {
        let mut stream = self.transport.connect(&self.host, self.port).await?;

        stream.write_all(request).await?;
        stream.flush().await?;
        tracing::debug!("wrote {} request bytes", request.len());

        let mut response = BytesMut::with_capacity(4 * 1024);
        loop {
            let n = stream.read_buf(&mut response).await?;
            if n == 0 {
                break; // remote closed
            }
        }
        tracing::debug!("received {} response bytes", response.len());

        Ok(response.to_vec())
    }
}

/// Parsed acknowledgement plus the snapshot of items it accounts for.
#[derive(Debug, Clone)]
pub struct Ack {
    /// Parsed JSON acknowledgement from the collector.
    pub response: Value,
    /// The items covered by this acknowledgement, in submission order.
    pub items: Vec<Item>,
}
