//! # zabbix-sender
//!
//! Async client for the Zabbix trapper protocol: submit batches of
//! timestamped key/value metric items to a collector over TCP, directly
//! or through a SOCKS proxy, and parse its acknowledgement.
//!
//! ## Architecture
//!
//! - **Queue**: pending items, stamped at insertion when enabled
//! - **Protocol**: bit-exact `ZBXD\x01` framing and the JSON envelope
//! - **Transport**: direct TCP or a SOCKS4/SOCKS5 CONNECT tunnel
//! - **Sender**: one exchange per send, snapshot-and-clear up front,
//!   failed snapshots restored to the queue for a caller-driven retry
//!
//! ## Example
//!
//! ```ignore
//! use zabbix_sender::Sender;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), zabbix_sender::SenderError> {
//!     let mut sender = Sender::builder()
//!         .host("zabbix.example")
//!         .with_timestamps()
//!         .build();
//!
//!     sender.add_item("cpu.load", 0.25).add_item("uptime", 86400);
//!
//!     let ack = sender.send().await?;
//!     println!("{}", ack.response["info"]);
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod protocol;
pub mod queue;
pub mod transport;

mod sender;

pub use error::SenderError;
pub use queue::{Item, ItemQueue, ItemValue, Timestamp};
pub use sender::{Ack, Sender, SenderBuilder};
pub use transport::{Proxy, SocksVersion, Transport};
