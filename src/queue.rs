//! Pending item queue with insertion-time timestamp stamping.
//!
//! The queue is an insertion-order buffer owned exclusively by the
//! [`Sender`](crate::Sender). Items enter through `push` (or a failure
//! requeue) and leave only through the snapshot-and-clear `take` step at
//! the start of a send, so a retry never loses or duplicates a reading.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// A metric value. The collector accepts strings and numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemValue {
    /// Integer reading.
    Int(i64),
    /// Floating-point reading.
    Float(f64),
    /// Text reading.
    Text(String),
}

impl From<&str> for ItemValue {
    fn from(value: &str) -> Self {
        ItemValue::Text(value.to_string())
    }
}

impl From<String> for ItemValue {
    fn from(value: String) -> Self {
        ItemValue::Text(value)
    }
}

impl From<i32> for ItemValue {
    fn from(value: i32) -> Self {
        ItemValue::Int(i64::from(value))
    }
}

impl From<i64> for ItemValue {
    fn from(value: i64) -> Self {
        ItemValue::Int(value)
    }
}

impl From<u32> for ItemValue {
    fn from(value: u32) -> Self {
        ItemValue::Int(i64::from(value))
    }
}

impl From<f64> for ItemValue {
    fn from(value: f64) -> Self {
        ItemValue::Float(value)
    }
}

/// A single (host, key, value) metric reading, optionally timestamped.
///
/// `clock` and `ns` are absent from the serialized form unless stamping
/// was enabled when the item was queued. Items are immutable once queued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Origin host the reading is attributed to.
    pub host: String,
    /// Item key on the collector side.
    pub key: String,
    /// The reading itself.
    pub value: ItemValue,
    /// Whole seconds of the wall-clock time at insertion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clock: Option<i64>,
    /// Sub-second remainder in nanoseconds, set only in nanosecond mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ns: Option<i64>,
}

/// One wall-clock reading split into whole seconds and a nanosecond
/// fraction.
///
/// Item-level stamping and the request-level stamp both use this type, so
/// the two are guaranteed to follow the same sampling rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
    /// Whole seconds since the Unix epoch.
    pub clock: i64,
    /// Sub-second remainder scaled to nanoseconds, truncated.
    pub ns: Option<i64>,
}

impl Timestamp {
    /// Sample the current wall-clock time.
    pub fn now(with_ns: bool) -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self {
            clock: now.as_secs() as i64,
            ns: with_ns.then(|| i64::from(now.subsec_nanos())),
        }
    }
}

/// Ordered buffer of pending metric items.
///
/// Owns the timestamp stamping policy: when timestamping is enabled every
/// pushed item is stamped with the wall clock at insertion, and `stamp`
/// produces the request-level reading sampled once per send.
#[derive(Debug)]
pub struct ItemQueue {
    items: Vec<Item>,
    with_timestamps: bool,
    with_ns: bool,
}

impl ItemQueue {
    /// Create an empty queue. Nanosecond mode implies timestamping.
    pub fn new(with_timestamps: bool, with_ns: bool) -> Self {
        Self {
            items: Vec::new(),
            with_timestamps: with_timestamps || with_ns,
            with_ns,
        }
    }

    /// Append an item, stamping it with the current wall-clock time when
    /// timestamping is enabled.
    pub fn push(
        &mut self,
        host: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<ItemValue>,
    ) {
        let mut item = Item {
            host: host.into(),
            key: key.into(),
            value: value.into(),
            clock: None,
            ns: None,
        };

        if self.with_timestamps {
            let stamp = Timestamp::now(self.with_ns);
            item.clock = Some(stamp.clock);
            item.ns = stamp.ns;
        }

        self.items.push(item);
    }

    /// Take a snapshot of all pending items, leaving the queue empty.
    ///
    /// This is the single atomic snapshot-and-clear step a send performs
    /// before any I/O.
    pub fn take(&mut self) -> Vec<Item> {
        std::mem::take(&mut self.items)
    }

    /// Append a failed snapshot back onto the queue, after anything queued
    /// since the snapshot was taken. Relative order is preserved within
    /// each subset.
    pub fn requeue(&mut self, snapshot: Vec<Item>) {
        self.items.extend(snapshot);
    }

    /// Sample the request-level timestamp, once per send.
    ///
    /// Returns `None` when timestamping is disabled.
    pub fn stamp(&self) -> Option<Timestamp> {
        self.with_timestamps.then(|| Timestamp::now(self.with_ns))
    }

    /// Replace the queue with an empty sequence.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Current queue length.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// View the pending items in insertion order.
    pub fn items(&self) -> &[Item] {
        &self.items
    }
}
