//! Circuit breaker for calls to a single venue.
//!
//! Tracks a sliding window of successes/failures per venue adapter and
//! trips to `Open` once the failure rate crosses a threshold, rejecting
//! calls until a probe succeeds. Unlike a fixed-timeout breaker, the
//! open-state wait grows exponentially on repeated reopens (capped), so a
//! venue stuck flapping doesn't get hammered with probes every second.
//!
//! ## States
//! - **Closed**: calls proceed normally.
//! - **Open**: calls are rejected immediately.
//! - **HalfOpen**: a limited number of probe calls are allowed through.
//!
//! # Example
//!
//! ```
//! use market_facade_circuitbreaker::CircuitBreakerConfigBuilder;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let breaker = CircuitBreakerConfigBuilder::new()
//!     .failure_rate_threshold(0.5)
//!     .sliding_window_size(20)
//!     .base_wait_duration_in_open(Duration::from_secs(1))
//!     .name("kraken-rest")
//!     .build::<std::io::Error>();
//!
//! let result = breaker.call(async { Ok::<_, std::io::Error>(42) }).await;
//! # let _ = result;
//! # Ok(())
//! # }
//! ```

mod circuit;
mod config;
mod error;
mod events;

pub use circuit::{CircuitMetrics, CircuitState};
pub use config::{CircuitBreakerConfig, CircuitBreakerConfigBuilder, SlidingWindowType};
pub use error::CircuitBreakerError;
pub use events::CircuitBreakerEvent;

use crate::circuit::Circuit;
use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

type SharedClassifier<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// A circuit breaker guarding calls that return `Result<T, E>`.
///
/// Cheap to clone — every clone shares the same underlying state.
pub struct CircuitBreaker<E> {
    config: Arc<CircuitBreakerConfig>,
    circuit: Arc<Mutex<Circuit>>,
    state_atomic: Arc<AtomicU8>,
    classifier: SharedClassifier<E>,
}

impl<E> Clone for CircuitBreaker<E> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            circuit: Arc::clone(&self.circuit),
            state_atomic: Arc::clone(&self.state_atomic),
            classifier: Arc::clone(&self.classifier),
        }
    }
}

impl<E> CircuitBreaker<E> {
    pub(crate) fn from_config(config: CircuitBreakerConfig, classifier: SharedClassifier<E>) -> Self {
        let state_atomic = Arc::new(AtomicU8::new(CircuitState::Closed as u8));
        let circuit = Circuit::new_with_atomic(Arc::clone(&state_atomic));
        Self {
            config: Arc::new(config),
            circuit: Arc::new(Mutex::new(circuit)),
            state_atomic,
            classifier,
        }
    }

    /// Starts building a new circuit breaker.
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }

    /// Returns the current state without taking the async lock, for hot
    /// paths (e.g. a venue-selector's quick health check) that only need
    /// an approximate read.
    pub fn state(&self) -> CircuitState {
        CircuitState::from_u8(self.state_atomic.load(Ordering::Acquire))
    }

    /// Returns a snapshot of the circuit's call statistics.
    pub async fn metrics(&self) -> CircuitMetrics {
        self.circuit.lock().await.metrics(&self.config)
    }

    /// Runs `fut` if the circuit permits it, recording the outcome.
    ///
    /// The wrapped error type (`E`) is classified via the classifier given
    /// at construction time — a classifier can exempt certain error
    /// variants (e.g. a malformed-payload error) from counting as a
    /// circuit failure at all.
    pub async fn call<T, Fut>(&self, fut: Fut) -> Result<T, CircuitBreakerError<E>>
    where
        Fut: Future<Output = Result<T, E>>,
    {
        let permitted = {
            let mut circuit = self.circuit.lock().await;
            circuit.try_acquire(&self.config)
        };

        if !permitted {
            return Err(CircuitBreakerError::Open);
        }

        let start = Instant::now();
        let result = fut.await;
        let duration = start.elapsed();

        let mut circuit = self.circuit.lock().await;
        match &result {
            Ok(_) => circuit.record_success(&self.config, duration),
            Err(e) if (self.classifier)(e) => circuit.record_failure(&self.config, duration),
            Err(_) => circuit.record_success(&self.config, duration),
        }
        drop(circuit);

        result.map_err(CircuitBreakerError::Inner)
    }

    /// Forces the circuit open, bypassing the probe timer, until
    /// [`Self::force_closed`] or [`Self::reset`] is called.
    pub async fn force_open(&self) {
        self.circuit.lock().await.force_open(&self.config);
    }

    /// Clears a forced-open override and closes the circuit.
    pub async fn force_closed(&self) {
        self.circuit.lock().await.force_closed(&self.config);
    }

    /// Resets the circuit to `Closed` and clears all counters, including
    /// the consecutive-opens backoff multiplier.
    pub async fn reset(&self) {
        self.circuit.lock().await.reset(&self.config);
    }
}
