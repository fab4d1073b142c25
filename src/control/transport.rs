//! Stream transport to the engine
//!
//! The session talks to a [`Transport`] obtained from a [`Connector`], so the
//! reconnect logic does not depend on the socket type.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use crate::common::{Error, Result};

use super::codec;

/// Host and port of the engine's control socket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// One open, line-oriented connection
#[async_trait]
pub trait Transport: Send {
    /// Write one message followed by the line terminator
    async fn send_line(&mut self, line: &[u8]) -> Result<()>;

    /// Block until one full line arrives
    async fn recv_line(&mut self) -> Result<Vec<u8>>;

    /// Close the connection. Safe to call more than once.
    async fn close(&mut self);
}

/// Opens transports to an endpoint
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, endpoint: &Endpoint, timeout: Duration) -> Result<Box<dyn Transport>>;
}

/// TCP connector used against a real engine
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self, endpoint: &Endpoint, timeout: Duration) -> Result<Box<dyn Transport>> {
        let addr = endpoint.to_string();

        // Only the connect itself is bounded; once up, the stream may idle forever.
        let stream = tokio::time::timeout(
            timeout,
            TcpStream::connect((endpoint.host.as_str(), endpoint.port)),
        )
        .await
        .map_err(|_| Error::ConnectTimeout {
            addr: addr.clone(),
            secs: timeout.as_secs(),
        })?
        .map_err(|e| Error::connect_failed(addr.as_str(), e))?;

        stream.set_nodelay(true)?;
        tracing::debug!("TCP connection established to {}", addr);

        Ok(Box::new(TcpTransport::new(stream)))
    }
}

/// Line transport over a TCP stream
pub struct TcpTransport {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    closed: bool,
}

impl TcpTransport {
    pub fn new(stream: TcpStream) -> Self {
        let (reader, writer) = stream.into_split();
        Self {
            reader: BufReader::new(reader),
            writer,
            closed: false,
        }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send_line(&mut self, line: &[u8]) -> Result<()> {
        if self.closed {
            return Err(Error::TransportClosed);
        }
        codec::write_line(&mut self.writer, line).await
    }

    async fn recv_line(&mut self) -> Result<Vec<u8>> {
        if self.closed {
            return Err(Error::TransportClosed);
        }
        codec::read_line(&mut self.reader).await
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.writer.shutdown().await {
            tracing::debug!("Ignoring error while closing transport: {}", e);
        }
    }
}
