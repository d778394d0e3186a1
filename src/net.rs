//! Stock TCP transport
//!
//! [`TcpConn`] adapts a [`tokio::net::TcpStream`] to the [`Conn`] contract,
//! enforcing per-direction deadlines, and [`TcpDialer`] is the matching
//! [`Dialer`]. Wrap a `TcpDialer` in a
//! [`RateLimitedDialer`](crate::dialer::RateLimitedDialer) to throttle plain
//! TCP egress.

use crate::conn::Conn;
use crate::dialer::Dialer;
use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{timeout_at, Instant};

fn deadline_error() -> io::Error {
    io::Error::new(io::ErrorKind::TimedOut, "i/o deadline exceeded")
}

/// TCP connection with read/write deadlines.
pub struct TcpConn {
    stream: TcpStream,
    read_deadline: Option<Instant>,
    write_deadline: Option<Instant>,
}

impl TcpConn {
    /// Connect to `addr` (`host:port`).
    pub async fn connect(addr: &str) -> io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self::new(stream))
    }

    /// Adapt an already-established stream.
    pub fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            read_deadline: None,
            write_deadline: None,
        }
    }

    /// Box into the trait object the dialer contract hands out.
    pub fn boxed(self) -> Box<dyn Conn> {
        Box::new(self)
    }
}

#[async_trait]
impl Conn for TcpConn {
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.read_deadline {
            Some(deadline) => timeout_at(deadline, self.stream.read(buf))
                .await
                .map_err(|_| deadline_error())?,
            None => self.stream.read(buf).await,
        }
    }

    async fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.write_deadline {
            Some(deadline) => timeout_at(deadline, self.stream.write_all(buf))
                .await
                .map_err(|_| deadline_error())??,
            None => self.stream.write_all(buf).await?,
        }
        Ok(buf.len())
    }

    async fn close(&mut self) -> io::Result<()> {
        self.stream.shutdown().await
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.stream.local_addr()
    }

    fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.stream.peer_addr()
    }

    fn set_deadline(&mut self, deadline: Option<Instant>) -> io::Result<()> {
        self.read_deadline = deadline;
        self.write_deadline = deadline;
        Ok(())
    }

    fn set_read_deadline(&mut self, deadline: Option<Instant>) -> io::Result<()> {
        self.read_deadline = deadline;
        Ok(())
    }

    fn set_write_deadline(&mut self, deadline: Option<Instant>) -> io::Result<()> {
        self.write_deadline = deadline;
        Ok(())
    }
}

/// Dialer establishing plain TCP connections.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpDialer;

#[async_trait]
impl Dialer for TcpDialer {
    async fn dial(&self, addr: &str) -> io::Result<Box<dyn Conn>> {
        Ok(TcpConn::connect(addr).await?.boxed())
    }
}
