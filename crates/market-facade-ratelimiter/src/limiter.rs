use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::error::RateLimiterError;

/// Token-bucket state. Tokens refill continuously at `refill_rate` tokens
/// per second, capped at `max_tokens`; an `acquire` either takes a token
/// immediately or reports how long the caller would need to wait.
#[derive(Debug)]
struct BucketState {
    max_tokens: f64,
    refill_rate: f64,
    tokens: f64,
    last_refill: Instant,
}

impl BucketState {
    fn new(max_tokens: f64, refill_rate: f64) -> Self {
        Self {
            max_tokens,
            refill_rate,
            tokens: max_tokens,
            last_refill: Instant::now(),
        }
    }

    /// Advances `tokens` by elapsed time, never exceeding `max_tokens` and
    /// never going negative.
    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        if elapsed > 0.0 {
            self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.max_tokens);
            self.last_refill = now;
        }
    }

    /// Takes one token if available; otherwise returns the wait needed for
    /// a token to become available.
    fn try_take(&mut self, now: Instant) -> Result<(), Duration> {
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            let deficit = 1.0 - self.tokens;
            let wait_secs = if self.refill_rate > 0.0 {
                deficit / self.refill_rate
            } else {
                f64::INFINITY
            };
            Err(Duration::from_secs_f64(wait_secs))
        }
    }

    fn available_tokens(&mut self) -> f64 {
        self.refill(Instant::now());
        self.tokens
    }

    fn set_rate(&mut self, max_tokens: f64, refill_rate: f64) {
        let now = Instant::now();
        self.refill(now);
        self.tokens = self.tokens.min(max_tokens);
        self.max_tokens = max_tokens;
        self.refill_rate = refill_rate;
    }
}

/// Shared, cloneable handle onto a token bucket.
#[derive(Debug, Clone)]
pub(crate) struct SharedRateLimiter {
    state: std::sync::Arc<Mutex<BucketState>>,
}

impl SharedRateLimiter {
    pub(crate) fn new(max_tokens: f64, refill_rate: f64) -> Self {
        Self {
            state: std::sync::Arc::new(Mutex::new(BucketState::new(max_tokens, refill_rate))),
        }
    }

    /// Attempts to take a token without waiting.
    pub(crate) fn try_acquire(&self) -> bool {
        let now = Instant::now();
        self.state.lock().unwrap().try_take(now).is_ok()
    }

    /// Waits (polling the bucket as time passes) until a token is available,
    /// the `timeout` wait budget is exceeded, or `cancel` fires.
    pub(crate) async fn wait(
        &self,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Duration, RateLimiterError> {
        let start = Instant::now();
        loop {
            let outcome = {
                let mut state = self.state.lock().unwrap();
                state.try_take(Instant::now())
            };

            match outcome {
                Ok(()) => return Ok(start.elapsed()),
                Err(needed) => {
                    let waited_so_far = start.elapsed();
                    if waited_so_far >= timeout {
                        return Err(RateLimiterError::Timeout { waited: waited_so_far });
                    }

                    let remaining_budget = timeout - waited_so_far;
                    let sleep_for = needed.min(remaining_budget);

                    tokio::select! {
                        _ = sleep(sleep_for) => {}
                        _ = cancel.cancelled() => return Err(RateLimiterError::Canceled),
                    }
                }
            }
        }
    }

    pub(crate) fn available_tokens(&self) -> f64 {
        self.state.lock().unwrap().available_tokens()
    }

    pub(crate) fn set_rate(&self, max_tokens: f64, refill_rate: f64) {
        self.state.lock().unwrap().set_rate(max_tokens, refill_rate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_tokens_equal_max() {
        let mut state = BucketState::new(10.0, 5.0);
        assert_eq!(state.available_tokens(), 10.0);
    }

    #[test]
    fn test_take_reduces_tokens() {
        let mut state = BucketState::new(10.0, 5.0);
        let now = Instant::now();
        assert!(state.try_take(now).is_ok());
        assert!((state.tokens - 9.0).abs() < 1e-9);
    }

    #[test]
    fn test_exhausted_bucket_reports_wait() {
        let mut state = BucketState::new(1.0, 1.0);
        let now = Instant::now();
        assert!(state.try_take(now).is_ok());
        let err = state.try_take(now).unwrap_err();
        assert!(err > Duration::ZERO);
    }

    #[test]
    fn test_refill_never_exceeds_max() {
        let mut state = BucketState::new(5.0, 100.0);
        let now = Instant::now() + Duration::from_secs(10);
        state.refill(now);
        assert_eq!(state.tokens, 5.0);
    }

    #[test]
    fn test_tokens_never_negative() {
        let mut state = BucketState::new(1.0, 0.0);
        let now = Instant::now();
        assert!(state.try_take(now).is_ok());
        assert!(state.try_take(now).is_err());
        assert!(state.tokens >= 0.0);
    }

    #[tokio::test]
    async fn test_try_acquire_immediate() {
        let limiter = SharedRateLimiter::new(2.0, 1.0);
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_blocks_until_refill() {
        let limiter = SharedRateLimiter::new(1.0, 2.0);
        assert!(limiter.try_acquire());

        let cancel = CancellationToken::new();
        let result = limiter.wait(Duration::from_secs(5), &cancel).await;
        assert!(result.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_times_out() {
        let limiter = SharedRateLimiter::new(1.0, 0.01);
        assert!(limiter.try_acquire());

        let cancel = CancellationToken::new();
        let result = limiter.wait(Duration::from_millis(50), &cancel).await;
        assert!(matches!(result, Err(RateLimiterError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_wait_respects_cancellation() {
        let limiter = SharedRateLimiter::new(1.0, 0.001);
        assert!(limiter.try_acquire());

        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = limiter.wait(Duration::from_secs(60), &cancel).await;
        assert!(matches!(result, Err(RateLimiterError::Canceled)));
    }

    #[test]
    fn test_set_rate_clamps_current_tokens() {
        let mut state = BucketState::new(10.0, 5.0);
        state.set_rate(3.0, 1.0);
        assert!(state.tokens <= 3.0);
    }
}
