//! Token-bucket rate limiting for outbound venue requests.
//!
//! Each venue adapter owns a [`RateLimiter`] sized to that venue's published
//! request budget. Tokens refill continuously rather than resetting at
//! fixed window boundaries, so a limiter never produces the boundary-burst
//! artifact of naive fixed-window limiters.
//!
//! # Examples
//!
//! ```
//! use market_facade_ratelimiter::RateLimiterConfigBuilder;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let limiter = RateLimiterConfigBuilder::new()
//!     .max_tokens(10.0)
//!     .refill_rate(10.0)
//!     .wait_timeout(Duration::from_millis(500))
//!     .name("kraken-rest")
//!     .build();
//!
//! if limiter.try_acquire() {
//!     // proceed immediately
//! }
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod events;
mod limiter;

pub use config::{RateLimiterConfig, RateLimiterConfigBuilder};
pub use error::RateLimiterError;
pub use events::RateLimiterEvent;

use crate::limiter::SharedRateLimiter;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// A token-bucket rate limiter.
///
/// Cloning a `RateLimiter` shares the same underlying bucket — clone it
/// freely across the tasks that need to respect one venue's rate budget.
#[derive(Clone)]
pub struct RateLimiter {
    config: std::sync::Arc<RateLimiterConfig>,
    bucket: SharedRateLimiter,
}

impl RateLimiter {
    /// Creates a new rate limiter from a built [`RateLimiterConfig`].
    pub fn new(config: RateLimiterConfig) -> Self {
        let bucket = SharedRateLimiter::new(config.max_tokens, config.refill_rate);
        Self {
            config: std::sync::Arc::new(config),
            bucket,
        }
    }

    /// Starts building a new rate limiter.
    pub fn builder() -> RateLimiterConfigBuilder {
        RateLimiterConfigBuilder::new()
    }

    /// Takes a token if one is immediately available, without waiting.
    pub fn try_acquire(&self) -> bool {
        let acquired = self.bucket.try_acquire();
        if acquired {
            self.emit_acquired(std::time::Duration::ZERO);
        }
        acquired
    }

    /// Waits for a token to become available, up to the configured
    /// `wait_timeout`, honoring `cancel`.
    pub async fn wait(&self, cancel: &CancellationToken) -> Result<(), RateLimiterError> {
        match self.bucket.wait(self.config.wait_timeout, cancel).await {
            Ok(waited) => {
                self.emit_acquired(waited);
                Ok(())
            }
            Err(err) => {
                match &err {
                    RateLimiterError::Timeout { waited } => self.emit_rejected(*waited),
                    RateLimiterError::Canceled => self.emit_canceled(),
                }
                Err(err)
            }
        }
    }

    /// Returns the current number of available tokens (for diagnostics).
    pub fn available_tokens(&self) -> f64 {
        self.bucket.available_tokens()
    }

    /// Changes the limiter's burst capacity and refill rate at runtime.
    ///
    /// Existing tokens are clamped to the new `max_tokens` if it is lower
    /// than the current token count.
    pub fn set_rate(&self, max_tokens: f64, refill_rate: f64) {
        self.bucket.set_rate(max_tokens, refill_rate);
        let event = RateLimiterEvent::RateChanged {
            pattern_name: self.config.name.clone(),
            timestamp: Instant::now(),
            max_tokens,
            refill_rate,
        };
        self.config.event_listeners.emit(&event);
    }

    fn emit_acquired(&self, wait_duration: std::time::Duration) {
        let event = RateLimiterEvent::PermitAcquired {
            pattern_name: self.config.name.clone(),
            timestamp: Instant::now(),
            wait_duration,
            tokens_remaining: self.bucket.available_tokens(),
        };
        self.config.event_listeners.emit(&event);
    }

    fn emit_rejected(&self, wait_duration: std::time::Duration) {
        let event = RateLimiterEvent::PermitRejected {
            pattern_name: self.config.name.clone(),
            timestamp: Instant::now(),
            wait_duration,
        };
        self.config.event_listeners.emit(&event);
    }

    fn emit_canceled(&self) {
        let event = RateLimiterEvent::PermitCanceled {
            pattern_name: self.config.name.clone(),
            timestamp: Instant::now(),
        };
        self.config.event_listeners.emit(&event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_allows_requests_within_burst() {
        let limiter = RateLimiter::builder().max_tokens(10.0).refill_rate(10.0).build();

        for _ in 0..10 {
            assert!(limiter.try_acquire());
        }
        assert!(!limiter.try_acquire());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_succeeds_after_refill() {
        let limiter = RateLimiter::builder()
            .max_tokens(1.0)
            .refill_rate(10.0)
            .wait_timeout(Duration::from_secs(1))
            .build();

        assert!(limiter.try_acquire());

        let cancel = CancellationToken::new();
        let result = limiter.wait(&cancel).await;
        assert!(result.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_times_out_under_sustained_load() {
        let limiter = RateLimiter::builder()
            .max_tokens(1.0)
            .refill_rate(0.001)
            .wait_timeout(Duration::from_millis(50))
            .build();

        assert!(limiter.try_acquire());

        let cancel = CancellationToken::new();
        let result = limiter.wait(&cancel).await;
        assert!(matches!(result, Err(RateLimiterError::Timeout { .. })));
    }

    #[test]
    fn test_event_listeners_called_on_acquire_and_reject() {
        let acquired_count = Arc::new(AtomicUsize::new(0));
        let ac = Arc::clone(&acquired_count);

        let limiter = RateLimiter::builder()
            .max_tokens(1.0)
            .refill_rate(0.0)
            .on_permit_acquired(move |_| {
                ac.fetch_add(1, Ordering::SeqCst);
            })
            .build();

        assert!(limiter.try_acquire());
        assert_eq!(acquired_count.load(Ordering::SeqCst), 1);
        assert!(!limiter.try_acquire());
    }

    #[test]
    fn test_set_rate_updates_budget() {
        let limiter = RateLimiter::builder().max_tokens(5.0).refill_rate(5.0).build();
        limiter.set_rate(2.0, 2.0);
        assert!(limiter.available_tokens() <= 2.0);
    }
}
