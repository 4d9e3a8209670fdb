use crate::events::CircuitBreakerEvent;
use market_facade_core::events::{EventListeners, FnListener};
use std::time::Duration;

/// Type of sliding window used for tracking calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlidingWindowType {
    /// Count-based window tracks the last N calls.
    CountBased,
    /// Time-based window tracks calls within a time duration.
    TimeBased,
}

/// Configuration for the circuit breaker's state machine.
///
/// Failure classification lives one level up, on [`crate::CircuitBreaker`]
/// itself, because it is tied to the caller's concrete error type while
/// this struct only needs the booleans it's handed.
pub struct CircuitBreakerConfig {
    pub(crate) failure_rate_threshold: f64,
    pub(crate) sliding_window_type: SlidingWindowType,
    pub(crate) sliding_window_size: usize,
    pub(crate) sliding_window_duration: Option<Duration>,
    pub(crate) base_wait_duration_in_open: Duration,
    pub(crate) backoff_factor: f64,
    pub(crate) max_wait_duration_in_open: Duration,
    pub(crate) permitted_calls_in_half_open: usize,
    pub(crate) minimum_number_of_calls: usize,
    pub(crate) slow_call_duration_threshold: Option<Duration>,
    pub(crate) slow_call_rate_threshold: f64,
    pub(crate) event_listeners: EventListeners<CircuitBreakerEvent>,
    pub(crate) name: String,
}

/// Builder for [`CircuitBreakerConfig`].
pub struct CircuitBreakerConfigBuilder {
    failure_rate_threshold: f64,
    sliding_window_type: SlidingWindowType,
    sliding_window_size: usize,
    sliding_window_duration: Option<Duration>,
    base_wait_duration_in_open: Duration,
    backoff_factor: f64,
    max_wait_duration_in_open: Duration,
    permitted_calls_in_half_open: usize,
    minimum_number_of_calls: Option<usize>,
    slow_call_duration_threshold: Option<Duration>,
    slow_call_rate_threshold: f64,
    event_listeners: EventListeners<CircuitBreakerEvent>,
    name: String,
}

impl Default for CircuitBreakerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CircuitBreakerConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self {
            failure_rate_threshold: 0.5,
            sliding_window_type: SlidingWindowType::CountBased,
            sliding_window_size: 100,
            sliding_window_duration: None,
            base_wait_duration_in_open: Duration::from_secs(1),
            backoff_factor: 2.0,
            max_wait_duration_in_open: Duration::from_secs(30),
            permitted_calls_in_half_open: 1,
            minimum_number_of_calls: None,
            slow_call_duration_threshold: None,
            slow_call_rate_threshold: 1.0,
            event_listeners: EventListeners::new(),
            name: String::from("<unnamed>"),
        }
    }

    /// Sets the failure rate threshold at which the circuit will open.
    ///
    /// Default: 0.5 (50%)
    pub fn failure_rate_threshold(mut self, rate: f64) -> Self {
        self.failure_rate_threshold = rate;
        self
    }

    /// Sets the type of sliding window to use.
    pub fn sliding_window_type(mut self, window_type: SlidingWindowType) -> Self {
        self.sliding_window_type = window_type;
        self
    }

    /// Sets the size of the sliding window (count-based).
    pub fn sliding_window_size(mut self, size: usize) -> Self {
        self.sliding_window_size = size;
        self
    }

    /// Sets the duration of the sliding window (time-based only).
    pub fn sliding_window_duration(mut self, duration: Duration) -> Self {
        self.sliding_window_duration = Some(duration);
        self
    }

    /// Sets the wait duration applied the first time the circuit opens.
    ///
    /// Each subsequent reopen (without an intervening sustained close)
    /// multiplies this by `backoff_factor`, capped at
    /// `max_wait_duration_in_open`.
    ///
    /// Default: 1 second
    pub fn base_wait_duration_in_open(mut self, duration: Duration) -> Self {
        self.base_wait_duration_in_open = duration;
        self
    }

    /// Sets the multiplier applied to the open-state wait on each
    /// consecutive reopen.
    ///
    /// Default: 2.0
    pub fn backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    /// Sets the ceiling on the open-state wait duration.
    ///
    /// Default: 30 seconds
    pub fn max_wait_duration_in_open(mut self, duration: Duration) -> Self {
        self.max_wait_duration_in_open = duration;
        self
    }

    /// Sets the number of permitted calls in the half-open state.
    ///
    /// Default: 1
    pub fn permitted_calls_in_half_open(mut self, n: usize) -> Self {
        self.permitted_calls_in_half_open = n;
        self
    }

    /// Sets the minimum number of calls before failure rate is evaluated.
    ///
    /// Default: same as sliding_window_size
    pub fn minimum_number_of_calls(mut self, n: usize) -> Self {
        self.minimum_number_of_calls = Some(n);
        self
    }

    /// Sets the duration threshold for considering a call "slow".
    pub fn slow_call_duration_threshold(mut self, duration: Duration) -> Self {
        self.slow_call_duration_threshold = Some(duration);
        self
    }

    /// Sets the slow call rate threshold at which the circuit will open.
    pub fn slow_call_rate_threshold(mut self, rate: f64) -> Self {
        self.slow_call_rate_threshold = rate;
        self
    }

    /// Give this breaker a human-readable name for observability.
    pub fn name<N: Into<String>>(mut self, n: N) -> Self {
        self.name = n.into();
        self
    }

    /// Register a callback for state transition events.
    pub fn on_state_transition<F>(mut self, f: F) -> Self
    where
        F: Fn(crate::CircuitState, crate::CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::StateTransition {
                    from_state,
                    to_state,
                    ..
                } = event
                {
                    f(*from_state, *to_state);
                }
            }));
        self
    }

    /// Register a callback for call rejected events.
    pub fn on_call_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if matches!(event, CircuitBreakerEvent::CallRejected { .. }) {
                    f();
                }
            }));
        self
    }

    /// Register a callback for slow call detected events.
    pub fn on_slow_call<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::SlowCallDetected { duration, .. } = event {
                    f(*duration);
                }
            }));
        self
    }

    /// Builds the bare [`CircuitBreakerConfig`] (used internally and by tests).
    pub(crate) fn build_config(self) -> CircuitBreakerConfig {
        if self.sliding_window_type == SlidingWindowType::TimeBased
            && self.sliding_window_duration.is_none()
        {
            panic!("sliding_window_duration must be set when using TimeBased sliding window");
        }

        CircuitBreakerConfig {
            failure_rate_threshold: self.failure_rate_threshold,
            sliding_window_type: self.sliding_window_type,
            sliding_window_size: self.sliding_window_size,
            sliding_window_duration: self.sliding_window_duration,
            base_wait_duration_in_open: self.base_wait_duration_in_open,
            backoff_factor: self.backoff_factor,
            max_wait_duration_in_open: self.max_wait_duration_in_open,
            permitted_calls_in_half_open: self.permitted_calls_in_half_open,
            minimum_number_of_calls: self
                .minimum_number_of_calls
                .unwrap_or(self.sliding_window_size),
            slow_call_duration_threshold: self.slow_call_duration_threshold,
            slow_call_rate_threshold: self.slow_call_rate_threshold,
            event_listeners: self.event_listeners,
            name: self.name,
        }
    }

    /// Builds the circuit breaker, using [`crate::classifier::DefaultClassifier`]
    /// to treat every `Err` as a failure.
    pub fn build<E>(self) -> crate::CircuitBreaker<E>
    where
        E: 'static,
    {
        crate::CircuitBreaker::from_config(
            self.build_config(),
            std::sync::Arc::new(|_: &E| true),
        )
    }

    /// Builds the circuit breaker with a custom failure classifier, for
    /// callers whose error type carries variants that should never count
    /// toward the failure rate (e.g. a malformed-payload error).
    pub fn build_with_classifier<E, F>(self, classifier: F) -> crate::CircuitBreaker<E>
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        crate::CircuitBreaker::from_config(self.build_config(), std::sync::Arc::new(classifier))
    }
}
