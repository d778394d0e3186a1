//! Dialer contract and the rate-limited dialer factory
//!
//! A [`Dialer`] establishes a connection to an address. [`RateLimitedDialer`]
//! adapts any dialer into one whose connections all share a single
//! [`TokenBucket`], capping aggregate egress across every connection and
//! reconnect the dialer ever produces.

use crate::bucket::TokenBucket;
use crate::conn::{Conn, RateLimitedConn};
use crate::error::Error;
use async_trait::async_trait;
use std::future::Future;
use std::io;
use std::sync::Arc;
use tracing::debug;

/// Strategy for establishing a connection to an address.
#[async_trait]
pub trait Dialer: Send + Sync {
    /// Connect to `addr`, returning the established connection.
    async fn dial(&self, addr: &str) -> io::Result<Box<dyn Conn>>;
}

/// Adapter lifting an async closure into a [`Dialer`].
///
/// Useful for wiring in-memory transports in tests or custom dial logic
/// without defining a named type:
///
/// ```no_run
/// use conn_rate_limit::{DialFn, TcpConn};
///
/// let dialer = DialFn::new(|addr: String| async move {
///     TcpConn::connect(&addr).await.map(TcpConn::boxed)
/// });
/// ```
pub struct DialFn<F>(F);

impl<F, Fut> DialFn<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = io::Result<Box<dyn Conn>>> + Send,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F, Fut> Dialer for DialFn<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = io::Result<Box<dyn Conn>>> + Send,
{
    async fn dial(&self, addr: &str) -> io::Result<Box<dyn Conn>> {
        (self.0)(addr.to_string()).await
    }
}

/// Dialer decorator that rate-limits egress on every connection it produces.
///
/// All connections share one bucket, so the configured rate is an aggregate
/// cap, not a per-connection cap: a transport that reconnects or opens
/// several connections through this dialer stays bounded by the single
/// configured rate. Independently configured limiters coexist freely; the
/// bucket lives in the dialer value, never in process-global state.
pub struct RateLimitedDialer<D> {
    base: D,
    bucket: Arc<TokenBucket>,
}

impl<D: Dialer> RateLimitedDialer<D> {
    /// Build a rate-limited dialer over `base`.
    ///
    /// `rate` is the refill speed in bytes per second and must be positive;
    /// `burst` is the bucket capacity in bytes and may be zero. Fails fast
    /// with a configuration error, never later.
    pub fn new(rate: f64, burst: u64, base: D) -> Result<Self, Error> {
        let bucket = Arc::new(TokenBucket::new(rate, burst)?);
        debug!(rate, burst, "rate-limited dialer configured");
        Ok(Self { base, bucket })
    }

    /// The bucket shared by every connection this dialer produces.
    pub fn bucket(&self) -> &Arc<TokenBucket> {
        &self.bucket
    }
}

#[async_trait]
impl<D: Dialer> Dialer for RateLimitedDialer<D> {
    /// Dials through the base dialer and wraps the result.
    ///
    /// Base-dialer errors pass through unchanged: no wrapping, no retry.
    async fn dial(&self, addr: &str) -> io::Result<Box<dyn Conn>> {
        let inner = self.base.dial(addr).await?;
        Ok(Box::new(RateLimitedConn::new(inner, Arc::clone(&self.bucket))))
    }
}
