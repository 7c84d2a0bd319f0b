//! Transport module - direct and SOCKS-proxied TCP connections.
//!
//! Both variants produce the same byte-stream contract for the sender:
//! write the full request once, then accumulate response bytes until the
//! remote closes the connection.

mod socks;

pub use socks::{Proxy, SocksVersion};

use tokio::net::TcpStream;

use crate::error::Result;

/// How the client reaches the collector.
#[derive(Debug, Clone, Default)]
pub enum Transport {
    /// Plain TCP connection to the collector.
    #[default]
    Direct,
    /// CONNECT tunnel through a SOCKS proxy.
    Socks(Proxy),
}

impl Transport {
    /// Establish a connected byte stream to `host:port`.
    ///
    /// The overall exchange deadline is armed by the caller; connect and
    /// handshake run inside it.
    pub async fn connect(&self, host: &str, port: u16) -> Result<TcpStream> {
        match self {
            Transport::Direct => {
                tracing::debug!("connecting to {}:{}", host, port);
                Ok(TcpStream::connect((host, port)).await?)
            }
            Transport::Socks(proxy) => socks::connect_through(proxy, host, port).await,
        }
    }
}
