//! Events emitted by the circuit breaker.

use crate::circuit::CircuitState;
use market_facade_core::ResilienceEvent;
use std::time::{Duration, Instant};

/// Events emitted by a [`crate::CircuitBreaker`].
#[derive(Debug, Clone)]
pub enum CircuitBreakerEvent {
    /// A call was permitted to proceed.
    CallPermitted {
        pattern_name: String,
        timestamp: Instant,
        state: CircuitState,
    },

    /// A call was rejected because the circuit is open.
    CallRejected {
        pattern_name: String,
        timestamp: Instant,
    },

    /// A call completed successfully.
    SuccessRecorded {
        pattern_name: String,
        timestamp: Instant,
        state: CircuitState,
    },

    /// A call failed.
    FailureRecorded {
        pattern_name: String,
        timestamp: Instant,
        state: CircuitState,
    },

    /// A call exceeded the slow-call duration threshold.
    SlowCallDetected {
        pattern_name: String,
        timestamp: Instant,
        duration: Duration,
        state: CircuitState,
    },

    /// The circuit transitioned between states.
    StateTransition {
        pattern_name: String,
        timestamp: Instant,
        from_state: CircuitState,
        to_state: CircuitState,
        /// How many consecutive times the circuit has reopened; drives the
        /// exponential backoff applied to the next open-state wait.
        consecutive_opens: usize,
    },
}

impl ResilienceEvent for CircuitBreakerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::CallPermitted { .. } => "call_permitted",
            Self::CallRejected { .. } => "call_rejected",
            Self::SuccessRecorded { .. } => "success_recorded",
            Self::FailureRecorded { .. } => "failure_recorded",
            Self::SlowCallDetected { .. } => "slow_call_detected",
            Self::StateTransition { .. } => "state_transition",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            Self::CallPermitted { timestamp, .. }
            | Self::CallRejected { timestamp, .. }
            | Self::SuccessRecorded { timestamp, .. }
            | Self::FailureRecorded { timestamp, .. }
            | Self::SlowCallDetected { timestamp, .. }
            | Self::StateTransition { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            Self::CallPermitted { pattern_name, .. }
            | Self::CallRejected { pattern_name, .. }
            | Self::SuccessRecorded { pattern_name, .. }
            | Self::FailureRecorded { pattern_name, .. }
            | Self::SlowCallDetected { pattern_name, .. }
            | Self::StateTransition { pattern_name, .. } => pattern_name,
        }
    }
}
