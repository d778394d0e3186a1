//! Token bucket rate limiter
//!
//! Tracks a byte budget that refills continuously up to a burst capacity.
//! Refill is computed lazily on each consume, so an idle bucket costs
//! nothing: no ticker, no background task.

use crate::error::Error;
use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::{self, Instant};
use tracing::debug;

/// Mutable bucket state, guarded by a single lock.
///
/// `tokens` may go negative: a waiter pre-commits its debit before sleeping,
/// so a second waiter arriving during the sleep queues behind it (its own
/// deficit includes the first waiter's debt) instead of racing past.
struct State {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket metering egress bytes.
///
/// One bucket is shared by every connection a [`RateLimitedDialer`] produces,
/// making the configured rate an aggregate cap rather than a per-connection
/// cap.
///
/// [`RateLimitedDialer`]: crate::dialer::RateLimitedDialer
pub struct TokenBucket {
    /// Refill speed in bytes per second.
    rate: f64,
    /// Maximum burst, in bytes.
    capacity: f64,
    state: Mutex<State>,
}

impl TokenBucket {
    /// Create a bucket that refills at `rate` bytes per second up to `burst`
    /// bytes. The bucket starts full.
    pub fn new(rate: f64, burst: u64) -> Result<Self, Error> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(Error::InvalidRate(rate));
        }

        Ok(Self {
            rate,
            capacity: burst as f64,
            state: Mutex::new(State {
                tokens: burst as f64,
                last_refill: Instant::now(),
            }),
        })
    }

    /// Debit `n` bytes, waiting for the budget to refill if necessary.
    ///
    /// Requests larger than the burst capacity are not rejected; the wait is
    /// simply proportional to `n / rate` once the current budget runs out.
    ///
    /// If `deadline` expires before the wait completes, returns
    /// [`Error::DeadlineExceeded`]. The debit is not rolled back in that
    /// case: refunding it would let waiters that queued behind the cancelled
    /// one overtake it, so the bucket stays slightly under-served instead.
    pub async fn consume(&self, n: usize, deadline: Option<Instant>) -> Result<(), Error> {
        if n == 0 {
            return Ok(());
        }

        let wait = {
            let mut state = self.state.lock();
            let now = Instant::now();
            let elapsed = now.duration_since(state.last_refill).as_secs_f64();
            state.tokens = (state.tokens + elapsed * self.rate).min(self.capacity);
            state.last_refill = now;

            let need = n as f64;
            if state.tokens >= need {
                state.tokens -= need;
                None
            } else {
                let deficit = need - state.tokens;
                state.tokens -= need;
                Some(Duration::from_secs_f64(deficit / self.rate))
            }
        };

        let Some(wait) = wait else {
            return Ok(());
        };

        debug!(bytes = n, wait_ms = wait.as_millis() as u64, "byte budget exhausted, throttling");

        let ready_at = Instant::now() + wait;
        match deadline {
            Some(deadline) => time::timeout_at(deadline, time::sleep_until(ready_at))
                .await
                .map_err(|_| Error::DeadlineExceeded),
            None => {
                time::sleep_until(ready_at).await;
                Ok(())
            }
        }
    }

    /// Refill speed in bytes per second.
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Maximum burst, in bytes.
    pub fn capacity(&self) -> f64 {
        self.capacity
    }
}

impl std::fmt::Debug for TokenBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenBucket")
            .field("rate", &self.rate)
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_invalid_rate_rejected() {
        assert!(TokenBucket::new(0.0, 10).is_err());
        assert!(TokenBucket::new(-5.0, 10).is_err());
        assert!(TokenBucket::new(f64::NAN, 10).is_err());
        assert!(TokenBucket::new(f64::INFINITY, 10).is_err());
        assert!(TokenBucket::new(10.0, 0).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_bucket_consumes_immediately() {
        let bucket = TokenBucket::new(100.0, 100).unwrap();

        let start = Instant::now();
        bucket.consume(100, None).await.unwrap();
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_bucket_waits_n_over_r() {
        // burst 0: bucket starts empty, 155 bytes at 10 B/s take 15.5s
        let bucket = TokenBucket::new(10.0, 0).unwrap();

        let start = Instant::now();
        bucket.consume(155, None).await.unwrap();
        let elapsed = start.elapsed();
        assert!(
            elapsed >= Duration::from_millis(15_400) && elapsed <= Duration::from_secs(16),
            "elapsed {:?}, expected ~15.5s",
            elapsed
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_split_writes_are_additive() {
        let bucket = TokenBucket::new(10.0, 0).unwrap();

        let start = Instant::now();
        for n in [50, 30, 20] {
            bucket.consume(n, None).await.unwrap();
        }
        let elapsed = start.elapsed();
        // 100 bytes total at 10 B/s, same as one 100-byte consume
        assert!(
            elapsed >= Duration::from_millis(9_900) && elapsed <= Duration::from_millis(10_500),
            "elapsed {:?}, expected ~10s",
            elapsed
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_then_refill() {
        let bucket = TokenBucket::new(100.0, 100).unwrap();

        let start = Instant::now();
        bucket.consume(100, None).await.unwrap();
        assert_eq!(start.elapsed(), Duration::ZERO);

        // Bucket now empty; the next 100 bytes need ~1s of refill.
        bucket.consume(100, None).await.unwrap();
        let elapsed = start.elapsed();
        assert!(
            elapsed >= Duration::from_millis(900) && elapsed <= Duration::from_millis(1_100),
            "elapsed {:?}, expected ~1s",
            elapsed
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_exceeded_while_waiting() {
        let bucket = TokenBucket::new(10.0, 0).unwrap();

        let start = Instant::now();
        let deadline = Instant::now() + Duration::from_secs(1);
        let err = bucket.consume(100, Some(deadline)).await.unwrap_err();
        assert!(matches!(err, Error::DeadlineExceeded));
        assert!(
            start.elapsed() <= Duration::from_millis(1_100),
            "deadline should fire at ~1s, elapsed {:?}",
            start.elapsed()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_ignored_when_budget_available() {
        let bucket = TokenBucket::new(10.0, 50).unwrap();

        // Already-expired deadline, but the budget covers the request.
        let deadline = Instant::now() - Duration::from_secs(1);
        bucket.consume(50, Some(deadline)).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_debit_is_not_refunded() {
        let bucket = TokenBucket::new(10.0, 0).unwrap();

        let deadline = Instant::now() + Duration::from_secs(1);
        bucket.consume(100, Some(deadline)).await.unwrap_err();

        // The 100-byte debit stays committed, so the next 10 bytes queue
        // behind the remaining debt: 1s of it already elapsed, 9s of debt
        // remain, plus 1s for the new request.
        let start = Instant::now();
        bucket.consume(10, None).await.unwrap();
        let elapsed = start.elapsed();
        assert!(
            elapsed >= Duration::from_millis(9_900) && elapsed <= Duration::from_millis(10_500),
            "elapsed {:?}, expected ~10s",
            elapsed
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_waiters_share_budget() {
        let bucket = Arc::new(TokenBucket::new(10.0, 0).unwrap());

        let start = Instant::now();
        let a = tokio::spawn({
            let bucket = Arc::clone(&bucket);
            async move { bucket.consume(50, None).await }
        });
        let b = tokio::spawn({
            let bucket = Arc::clone(&bucket);
            async move { bucket.consume(50, None).await }
        });
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        // 100 bytes total at 10 B/s: the waits must serialize (~10s), not
        // overlap (~5s).
        let elapsed = start.elapsed();
        assert!(
            elapsed >= Duration::from_millis(9_900) && elapsed <= Duration::from_millis(10_500),
            "elapsed {:?}, expected ~10s aggregate",
            elapsed
        );
    }
}
