use crate::events::RateLimiterEvent;
use market_facade_core::events::{EventListeners, FnListener};
use std::time::Duration;

/// Configuration for a [`crate::RateLimiter`].
pub struct RateLimiterConfig {
    pub(crate) max_tokens: f64,
    pub(crate) refill_rate: f64,
    pub(crate) wait_timeout: Duration,
    pub(crate) event_listeners: EventListeners<RateLimiterEvent>,
    pub(crate) name: String,
}

/// Builder for [`RateLimiterConfig`].
pub struct RateLimiterConfigBuilder {
    max_tokens: f64,
    refill_rate: f64,
    wait_timeout: Duration,
    event_listeners: EventListeners<RateLimiterEvent>,
    name: String,
}

impl Default for RateLimiterConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiterConfigBuilder {
    /// Creates a new builder with defaults.
    ///
    /// Defaults:
    /// - max_tokens (burst capacity): 50
    /// - refill_rate: 50 tokens/second
    /// - wait_timeout: 100ms
    /// - name: `"<unnamed>"`
    pub fn new() -> Self {
        Self {
            max_tokens: 50.0,
            refill_rate: 50.0,
            wait_timeout: Duration::from_millis(100),
            event_listeners: EventListeners::new(),
            name: "<unnamed>".to_string(),
        }
    }

    /// Sets the bucket's burst capacity — the maximum number of tokens it
    /// can hold at once.
    pub fn max_tokens(mut self, max_tokens: f64) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Sets the steady-state refill rate in tokens per second.
    pub fn refill_rate(mut self, tokens_per_second: f64) -> Self {
        self.refill_rate = tokens_per_second;
        self
    }

    /// Sets how long a caller will wait for a token before giving up.
    ///
    /// If taking a token would require waiting longer than this, the
    /// acquire fails with [`crate::RateLimiterError::Timeout`] rather than
    /// blocking indefinitely.
    pub fn wait_timeout(mut self, duration: Duration) -> Self {
        self.wait_timeout = duration;
        self
    }

    /// Sets the name for this rate limiter instance (used in events).
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback invoked when a permit is acquired, immediately
    /// or after waiting for tokens to refill.
    pub fn on_permit_acquired<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RateLimiterEvent::PermitAcquired { wait_duration, .. } = event {
                f(*wait_duration);
            }
        }));
        self
    }

    /// Registers a callback invoked when a permit request is rejected
    /// because the wait budget was exceeded.
    pub fn on_permit_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RateLimiterEvent::PermitRejected { wait_duration, .. } = event {
                f(*wait_duration);
            }
        }));
        self
    }

    /// Builds the rate limiter.
    pub fn build(self) -> crate::RateLimiter {
        let config = RateLimiterConfig {
            max_tokens: self.max_tokens,
            refill_rate: self.refill_rate,
            wait_timeout: self.wait_timeout,
            event_listeners: self.event_listeners,
            name: self.name,
        };

        crate::RateLimiter::new(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let _limiter = RateLimiterConfigBuilder::new().build();
    }

    #[test]
    fn test_builder_custom_values() {
        let _limiter = RateLimiterConfigBuilder::new()
            .max_tokens(100.0)
            .refill_rate(20.0)
            .wait_timeout(Duration::from_millis(500))
            .name("kraken-rest")
            .build();
    }

    #[test]
    fn test_event_listeners() {
        let _limiter = RateLimiterConfigBuilder::new()
            .on_permit_acquired(|_| {})
            .on_permit_rejected(|_| {})
            .build();
    }
}
