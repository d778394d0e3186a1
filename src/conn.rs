//! Connection contract and the rate-limited connection decorator
//!
//! [`Conn`] is the capability set the limiter requires of a transport
//! connection and guarantees on its output. [`RateLimitedConn`] wraps one
//! connection and gates outgoing writes through a shared [`TokenBucket`];
//! everything else is pure delegation.

use crate::bucket::TokenBucket;
use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::time::Instant;

/// A bidirectional byte-stream connection with addresses and I/O deadlines.
///
/// `write` either transmits the whole buffer or fails; partial writes are not
/// part of the contract. Deadlines apply to all I/O started after they are
/// set; `None` clears a deadline.
#[async_trait]
pub trait Conn: Send {
    /// Read up to `buf.len()` bytes, returning how many were read. `Ok(0)`
    /// means the peer closed the connection.
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write the entire buffer, returning its length on success.
    async fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Close both directions of the connection.
    async fn close(&mut self) -> io::Result<()>;

    /// Local endpoint address.
    fn local_addr(&self) -> io::Result<SocketAddr>;

    /// Remote endpoint address.
    fn peer_addr(&self) -> io::Result<SocketAddr>;

    /// Set both the read and write deadlines.
    fn set_deadline(&mut self, deadline: Option<Instant>) -> io::Result<()>;

    /// Set the deadline for future reads.
    fn set_read_deadline(&mut self, deadline: Option<Instant>) -> io::Result<()>;

    /// Set the deadline for future writes.
    fn set_write_deadline(&mut self, deadline: Option<Instant>) -> io::Result<()>;
}

#[async_trait]
impl Conn for Box<dyn Conn> {
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read(buf).await
    }

    async fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (**self).write(buf).await
    }

    async fn close(&mut self) -> io::Result<()> {
        (**self).close().await
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        (**self).local_addr()
    }

    fn peer_addr(&self) -> io::Result<SocketAddr> {
        (**self).peer_addr()
    }

    fn set_deadline(&mut self, deadline: Option<Instant>) -> io::Result<()> {
        (**self).set_deadline(deadline)
    }

    fn set_read_deadline(&mut self, deadline: Option<Instant>) -> io::Result<()> {
        (**self).set_read_deadline(deadline)
    }

    fn set_write_deadline(&mut self, deadline: Option<Instant>) -> io::Result<()> {
        (**self).set_write_deadline(deadline)
    }
}

impl std::fmt::Debug for dyn Conn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conn").finish_non_exhaustive()
    }
}

/// Connection decorator that meters egress bytes through a [`TokenBucket`].
///
/// Reads are never throttled; this limiter caps egress only. The wrapper owns
/// the underlying connection exclusively (closing the wrapper closes it) but
/// only borrows the bucket, which may be shared with sibling connections
/// produced by the same dialer.
pub struct RateLimitedConn<C> {
    inner: C,
    bucket: Arc<TokenBucket>,
    /// Mirror of the write deadline, so the bucket wait honors it too, not
    /// just the raw I/O on the inner connection.
    write_deadline: Option<Instant>,
}

impl<C: Conn> RateLimitedConn<C> {
    /// Wrap `inner`, debiting every write against `bucket`.
    pub fn new(inner: C, bucket: Arc<TokenBucket>) -> Self {
        Self {
            inner,
            bucket,
            write_deadline: None,
        }
    }

    /// The underlying connection.
    pub fn get_ref(&self) -> &C {
        &self.inner
    }

    /// Unwrap, discarding the limiter.
    pub fn into_inner(self) -> C {
        self.inner
    }
}

#[async_trait]
impl<C: Conn> Conn for RateLimitedConn<C> {
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf).await
    }

    /// Debits the bucket for the full buffer before touching the underlying
    /// connection. If the write deadline expires while waiting for budget,
    /// fails with [`io::ErrorKind::TimedOut`] and the underlying connection
    /// never sees the data.
    async fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bucket
            .consume(buf.len(), self.write_deadline)
            .await
            .map_err(|e| e.into_io())?;
        self.inner.write(buf).await
    }

    async fn close(&mut self) -> io::Result<()> {
        self.inner.close().await
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }

    fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.inner.peer_addr()
    }

    fn set_deadline(&mut self, deadline: Option<Instant>) -> io::Result<()> {
        self.write_deadline = deadline;
        self.inner.set_deadline(deadline)
    }

    fn set_read_deadline(&mut self, deadline: Option<Instant>) -> io::Result<()> {
        self.inner.set_read_deadline(deadline)
    }

    fn set_write_deadline(&mut self, deadline: Option<Instant>) -> io::Result<()> {
        self.write_deadline = deadline;
        self.inner.set_write_deadline(deadline)
    }
}
