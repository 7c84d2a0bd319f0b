//! SOCKS CONNECT handshakes.
//!
//! Minimal client side of SOCKS5 (RFC 1928, no authentication) and SOCKS4,
//! just enough to open a tunnel to the collector through a proxy. The
//! target is always sent as a host name so the proxy performs resolution.
//!
//! The handshake functions are generic over the stream so they can be
//! exercised against in-memory duplex pairs in tests.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::{Result, SenderError};

/// SOCKS protocol version for the proxy hop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SocksVersion {
    /// SOCKS4 with the host-name extension.
    V4,
    /// SOCKS5, no authentication.
    #[default]
    V5,
}

/// SOCKS proxy descriptor.
#[derive(Debug, Clone)]
pub struct Proxy {
    /// Proxy host.
    pub host: String,
    /// Proxy port.
    pub port: u16,
    /// Protocol version spoken with the proxy.
    pub version: SocksVersion,
}

impl Proxy {
    /// Describe a SOCKS5 proxy at `host:port`.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            version: SocksVersion::default(),
        }
    }

    /// Select the SOCKS protocol version.
    pub fn version(mut self, version: SocksVersion) -> Self {
        self.version = version;
        self
    }
}

/// CONNECT through `proxy` to `host:port` and return the tunneled stream.
///
/// After the handshake completes the stream behaves exactly like a direct
/// connection to the target.
pub(crate) async fn connect_through(proxy: &Proxy, host: &str, port: u16) -> Result<TcpStream> {
    tracing::debug!(
        "connecting to {}:{} via socks proxy {}:{}",
        host,
        port,
        proxy.host,
        proxy.port
    );

    let mut stream = TcpStream::connect((proxy.host.as_str(), proxy.port)).await?;
    match proxy.version {
        SocksVersion::V5 => socks5_connect(&mut stream, host, port).await?,
        SocksVersion::V4 => socks4_connect(&mut stream, host, port).await?,
    }
    Ok(stream)
}

/// Perform the SOCKS5 greeting and CONNECT request on `stream`.
pub(crate) async fn socks5_connect<S>(stream: &mut S, host: &str, port: u16) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if host.len() > 255 {
        return Err(SenderError::Proxy("target host name too long".into()));
    }

    // Greeting: version 5, one method offered, no auth.
    stream.write_all(&[0x05, 0x01, 0x00]).await?;

    let mut choice = [0u8; 2];
    stream.read_exact(&mut choice).await?;
    if choice != [0x05, 0x00] {
        return Err(SenderError::Proxy(format!(
            "no acceptable auth method: {:02x?}",
            choice
        )));
    }

    // CONNECT with a domain-name target; the proxy resolves the host.
    let mut request = Vec::with_capacity(7 + host.len());
    request.extend_from_slice(&[0x05, 0x01, 0x00, 0x03, host.len() as u8]);
    request.extend_from_slice(host.as_bytes());
    request.extend_from_slice(&port.to_be_bytes());
    stream.write_all(&request).await?;

    let mut reply = [0u8; 4];
    stream.read_exact(&mut reply).await?;
    if reply[0] != 0x05 {
        return Err(SenderError::Proxy(format!(
            "unexpected reply version {:#04x}",
            reply[0]
        )));
    }
    if reply[1] != 0x00 {
        return Err(SenderError::Proxy(format!(
            "connect rejected: {}",
            socks5_reply_name(reply[1])
        )));
    }

    // Drain the bound address so the stream is positioned at tunnel data.
    let addr_len = match reply[3] {
        0x01 => 4,
        0x04 => 16,
        0x03 => {
            let mut len = [0u8; 1];
            stream.read_exact(&mut len).await?;
            len[0] as usize
        }
        other => {
            return Err(SenderError::Proxy(format!(
                "unknown address type {other:#04x}"
            )))
        }
    };
    let mut bound = vec![0u8; addr_len + 2];
    stream.read_exact(&mut bound).await?;

    Ok(())
}

/// Perform a SOCKS4 CONNECT on `stream`.
///
/// Uses the host-name extension (destination 0.0.0.1 with the name
/// trailing the request) so the proxy resolves the target.
pub(crate) async fn socks4_connect<S>(stream: &mut S, host: &str, port: u16) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut request = Vec::with_capacity(10 + host.len());
    request.extend_from_slice(&[0x04, 0x01]);
    request.extend_from_slice(&port.to_be_bytes());
    request.extend_from_slice(&[0x00, 0x00, 0x00, 0x01]);
    request.push(0x00); // empty user id
    request.extend_from_slice(host.as_bytes());
    request.push(0x00);
    stream.write_all(&request).await?;

    let mut reply = [0u8; 8];
    stream.read_exact(&mut reply).await?;
    if reply[1] != 0x5A {
        return Err(SenderError::Proxy(format!(
            "connect rejected: {}",
            socks4_reply_name(reply[1])
        )));
    }

    Ok(())
}

fn socks5_reply_name(code: u8) -> &'static str {
    match code {
        0x01 => "general failure",
        0x02 => "connection not allowed",
        0x03 => "network unreachable",
        0x04 => "host unreachable",
        0x05 => "connection refused",
        0x06 => "TTL expired",
        0x07 => "command not supported",
        0x08 => "address type not supported",
        _ => "unknown error",
    }
}

fn socks4_reply_name(code: u8) -> &'static str {
    match code {
        0x5B => "request rejected or failed",
        0x5C => "identd unreachable",
        0x5D => "identd mismatch",
        _ => "unknown error",
    }
}
