//! Per-venue health bookkeeping.
//!
//! `HealthTracker` is the mutable, lock-protected half; `HealthRecord` is the
//! read-only snapshot exposed to callers. Grounded on the teacher's
//! `HealthCheckedContext`/`ContextState` pair for the lock-protected-counters
//! shape, generalized so status is derived from the full conjunction a venue
//! must satisfy to count as healthy: started, consecutive failures below
//! threshold, and success rate at or above a configured floor. A fourth
//! conjunct — the venue's circuit breaker not being open — lives outside this
//! crate entirely (the breaker is owned by `market-facade`'s `VenueRuntime`),
//! so it is ANDed in by the facade layer rather than here.

use crate::HealthStatus;
use std::sync::RwLock;
use std::time::{Duration, Instant};

struct HealthState {
    status: HealthStatus,
    started: bool,
    last_check_at: Option<Instant>,
    consecutive_successes: u64,
    consecutive_failures: u64,
    total_checks: u64,
    successful_checks: u64,
    last_latency: Duration,
}

impl Default for HealthState {
    fn default() -> Self {
        Self {
            status: HealthStatus::Unknown,
            started: false,
            last_check_at: None,
            consecutive_successes: 0,
            consecutive_failures: 0,
            total_checks: 0,
            successful_checks: 0,
            last_latency: Duration::ZERO,
        }
    }
}

fn success_rate_of(state: &HealthState) -> f64 {
    if state.total_checks == 0 {
        1.0
    } else {
        state.successful_checks as f64 / state.total_checks as f64
    }
}

/// A venue is Healthy iff it has started, its consecutive failure streak is
/// below `failure_threshold`, and its running success rate is at or above
/// `min_success_rate`. Falling short on the failure streak is Unhealthy;
/// falling short only on success rate is Degraded (still usable, just
/// flaky); not yet started is Unknown.
fn derive_status(state: &HealthState, failure_threshold: u32, min_success_rate: f64) -> HealthStatus {
    if !state.started {
        return HealthStatus::Unknown;
    }
    if state.consecutive_failures >= u64::from(failure_threshold) {
        return HealthStatus::Unhealthy;
    }
    if success_rate_of(state) < min_success_rate {
        return HealthStatus::Degraded;
    }
    HealthStatus::Healthy
}

/// A read-only snapshot of a venue's health at one point in time.
#[derive(Debug, Clone, Copy)]
pub struct HealthRecord {
    pub status: HealthStatus,
    pub started: bool,
    pub last_check_at: Option<Instant>,
    pub consecutive_successes: u64,
    pub consecutive_failures: u64,
    pub total_checks: u64,
    pub successful_checks: u64,
    pub last_latency: Duration,
}

impl HealthRecord {
    /// `successful_checks / total_checks`, or `1.0` before the first check
    /// (an untested venue is optimistically assumed fine until proven
    /// otherwise, matching `HealthStatus::Unknown` being usable-by-default
    /// nowhere else — callers should still gate on `status`).
    pub fn success_rate(&self) -> f64 {
        if self.total_checks == 0 {
            1.0
        } else {
            self.successful_checks as f64 / self.total_checks as f64
        }
    }
}

pub(crate) struct HealthTracker {
    state: RwLock<HealthState>,
}

impl HealthTracker {
    pub(crate) fn new() -> Self {
        Self {
            state: RwLock::new(HealthState::default()),
        }
    }

    /// Marks the venue as started (its adapter's `start()` succeeded),
    /// making it eligible to be considered Healthy. Returns
    /// `(previous_status, new_status)`.
    pub(crate) fn mark_started(&self, failure_threshold: u32, min_success_rate: f64) -> (HealthStatus, HealthStatus) {
        let mut state = self.state.write().expect("health state lock poisoned");
        let previous = state.status;
        state.started = true;
        state.status = derive_status(&state, failure_threshold, min_success_rate);
        (previous, state.status)
    }

    /// Records a successful check. Returns `(previous_status, new_status)`.
    pub(crate) fn record_success(
        &self,
        latency: Duration,
        failure_threshold: u32,
        min_success_rate: f64,
    ) -> (HealthStatus, HealthStatus) {
        let mut state = self.state.write().expect("health state lock poisoned");
        let previous = state.status;

        state.consecutive_successes += 1;
        state.consecutive_failures = 0;
        state.total_checks += 1;
        state.successful_checks += 1;
        state.last_latency = latency;
        state.last_check_at = Some(Instant::now());

        state.status = derive_status(&state, failure_threshold, min_success_rate);
        (previous, state.status)
    }

    /// Records a failed check. Returns `(previous_status, new_status)`.
    pub(crate) fn record_failure(&self, failure_threshold: u32, min_success_rate: f64) -> (HealthStatus, HealthStatus) {
        let mut state = self.state.write().expect("health state lock poisoned");
        let previous = state.status;

        state.consecutive_failures += 1;
        state.consecutive_successes = 0;
        state.total_checks += 1;
        state.last_check_at = Some(Instant::now());

        state.status = derive_status(&state, failure_threshold, min_success_rate);
        (previous, state.status)
    }

    pub(crate) fn snapshot(&self) -> HealthRecord {
        let state = self.state.read().expect("health state lock poisoned");
        HealthRecord {
            status: state.status,
            started: state.started,
            last_check_at: state.last_check_at,
            consecutive_successes: state.consecutive_successes,
            consecutive_failures: state.consecutive_failures,
            total_checks: state.total_checks,
            successful_checks: state.successful_checks,
            last_latency: state.last_latency,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unknown() {
        let tracker = HealthTracker::new();
        assert_eq!(tracker.snapshot().status, HealthStatus::Unknown);
    }

    #[test]
    fn unstarted_venue_stays_unknown_even_after_successes() {
        let tracker = HealthTracker::new();
        let (_, cur) = tracker.record_success(Duration::from_millis(10), 2, 0.5);
        assert_eq!(cur, HealthStatus::Unknown);
    }

    #[test]
    fn becomes_healthy_once_started_with_failures_below_threshold_and_rate_above_floor() {
        let tracker = HealthTracker::new();
        tracker.mark_started(2, 0.5);
        let (prev, cur) = tracker.record_success(Duration::from_millis(10), 2, 0.5);
        assert_eq!(prev, HealthStatus::Unknown);
        assert_eq!(cur, HealthStatus::Healthy);
    }

    #[test]
    fn becomes_unhealthy_after_consecutive_failure_threshold() {
        let tracker = HealthTracker::new();
        tracker.mark_started(2, 0.5);
        tracker.record_success(Duration::from_millis(5), 2, 0.5);
        assert_eq!(tracker.snapshot().status, HealthStatus::Healthy);

        tracker.record_failure(2, 0.5);
        assert_eq!(tracker.snapshot().status, HealthStatus::Healthy);
        tracker.record_failure(2, 0.5);
        assert_eq!(tracker.snapshot().status, HealthStatus::Unhealthy);
    }

    #[test]
    fn low_success_rate_below_failure_threshold_is_degraded_not_unhealthy() {
        let tracker = HealthTracker::new();
        tracker.mark_started(10, 0.9);
        tracker.record_success(Duration::from_millis(1), 10, 0.9);
        tracker.record_failure(10, 0.9);
        // 1/2 = 0.5 < 0.9, but only one consecutive failure (threshold 10).
        assert_eq!(tracker.snapshot().status, HealthStatus::Degraded);
    }

    #[test]
    fn success_resets_failure_streak() {
        let tracker = HealthTracker::new();
        tracker.mark_started(5, 0.0);
        tracker.record_failure(5, 0.0);
        tracker.record_failure(5, 0.0);
        assert_eq!(tracker.snapshot().consecutive_failures, 2);

        tracker.record_success(Duration::from_millis(1), 100, 0.0);
        let snap = tracker.snapshot();
        assert_eq!(snap.consecutive_failures, 0);
        assert_eq!(snap.consecutive_successes, 1);
    }

    #[test]
    fn success_rate_tracks_total_vs_successful() {
        let tracker = HealthTracker::new();
        tracker.mark_started(10, 0.0);
        tracker.record_success(Duration::from_millis(1), 10, 0.0);
        tracker.record_failure(10, 0.0);
        tracker.record_failure(10, 0.0);
        let snap = tracker.snapshot();
        assert_eq!(snap.total_checks, 3);
        assert_eq!(snap.successful_checks, 1);
        assert!((snap.success_rate() - (1.0 / 3.0)).abs() < 1e-9);
    }

    #[test]
    fn success_rate_before_any_check_is_one() {
        let tracker = HealthTracker::new();
        assert_eq!(tracker.snapshot().success_rate(), 1.0);
    }
}
