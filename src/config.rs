//! Configuration types
//!
//! JSON-serializable throttle settings, validated before a limiter is built.

use crate::dialer::{Dialer, RateLimitedDialer};
use crate::error::Error;
use serde::{Deserialize, Serialize};

/// Egress throttle configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ThrottleConfig {
    /// Refill speed in bytes per second. Must be positive.
    pub rate_bytes_per_sec: f64,

    /// Maximum burst in bytes. Zero disables bursting; large writes are
    /// still permitted and simply paced at the configured rate.
    pub burst_bytes: u64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            rate_bytes_per_sec: default_rate(),
            burst_bytes: 0,
        }
    }
}

fn default_rate() -> f64 {
    // 1 MiB/s
    1_048_576.0
}

impl ThrottleConfig {
    /// Check the configuration without building anything.
    pub fn validate(&self) -> Result<(), Error> {
        if !self.rate_bytes_per_sec.is_finite() || self.rate_bytes_per_sec <= 0.0 {
            return Err(Error::InvalidRate(self.rate_bytes_per_sec));
        }
        Ok(())
    }

    /// Build a rate-limited dialer over `base` from this configuration.
    pub fn wrap<D: Dialer>(&self, base: D) -> Result<RateLimitedDialer<D>, Error> {
        RateLimitedDialer::new(self.rate_bytes_per_sec, self.burst_bytes, base)
    }
}
