//! Bandwidth throttling for outbound connections
//!
//! This crate caps the byte rate a client pushes onto a transport by wrapping
//! the dial path, not the transport itself:
//!
//! - **[`TokenBucket`]**: a byte budget that refills continuously up to a
//!   burst capacity, debited per write.
//! - **[`RateLimitedConn`]**: a connection decorator that gates writes
//!   through a bucket and passes everything else straight through. Reads are
//!   never throttled.
//! - **[`RateLimitedDialer`]**: turns any [`Dialer`] into a rate-limited
//!   dialer of identical shape. Every connection it produces shares one
//!   bucket, so the configured rate bounds *aggregate* egress across
//!   reconnects and concurrent connections.
//!
//! Typical uses: emulating constrained links, enforcing fair-share egress,
//! or testing backpressure behavior of higher-level protocols.
//!
//! # Example
//!
//! ```no_run
//! use conn_rate_limit::{Conn, Dialer, RateLimitedDialer, TcpDialer};
//!
//! # #[tokio::main]
//! # async fn main() -> std::io::Result<()> {
//! // 10 KiB/s aggregate egress, 4 KiB burst.
//! let dialer = RateLimitedDialer::new(10_240.0, 4_096, TcpDialer)
//!     .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
//!
//! let mut conn = dialer.dial("example.com:9000").await?;
//! conn.write(b"paced by the bucket").await?;
//! # Ok(()) }
//! ```
//!
//! # Semantics of note
//!
//! - Writes larger than the burst capacity are permitted; they wait in
//!   proportion to `len / rate` rather than being rejected.
//! - Waiters pre-commit their debit, so concurrent writers are served in
//!   arrival order. A write cancelled by its deadline does not refund the
//!   debit.
//! - The limiter adds exactly one failure mode (a timed-out wait, surfaced
//!   as [`std::io::ErrorKind::TimedOut`]); dialer and transport errors pass
//!   through unchanged.

pub mod bucket;
pub mod config;
pub mod conn;
pub mod dialer;
pub mod error;
pub mod net;

// Re-export main types
pub use bucket::TokenBucket;
pub use config::ThrottleConfig;
pub use conn::{Conn, RateLimitedConn};
pub use dialer::{DialFn, Dialer, RateLimitedDialer};
pub use error::Error;
pub use net::{TcpConn, TcpDialer};
