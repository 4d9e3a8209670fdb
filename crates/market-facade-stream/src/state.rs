//! Connection lifecycle state.

use std::time::Duration;

/// A venue connection's lifecycle state.
///
/// ```text
/// [Disconnected] -connect()-> [Connecting] -handshake ok-> [Connected]
///                                          |
///                                          +-handshake fail-> [Backoff(d)] -after d-> [Connecting]
/// [Connected] -read error|ping timeout-> [Backoff(d=min(d*2, 30s))] -> [Connecting]
/// [Any] -ctx cancel-> [Closed] (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Backoff(Duration),
    Closed,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

/// Exponential backoff with a cap, reset to the initial delay on every
/// successful handshake.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    initial: Duration,
    max: Duration,
}

impl BackoffPolicy {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self { initial, max }
    }

    pub fn initial(&self) -> Duration {
        self.initial
    }

    /// The next delay after `current`, doubled and capped at `max`.
    pub fn next(&self, current: Duration) -> Duration {
        current.saturating_mul(2).min(self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_until_cap() {
        let policy = BackoffPolicy::new(Duration::from_secs(1), Duration::from_secs(30));
        let mut delay = policy.initial();
        assert_eq!(delay, Duration::from_secs(1));

        delay = policy.next(delay);
        assert_eq!(delay, Duration::from_secs(2));
        delay = policy.next(delay);
        assert_eq!(delay, Duration::from_secs(4));
        delay = policy.next(delay);
        assert_eq!(delay, Duration::from_secs(8));
        delay = policy.next(delay);
        assert_eq!(delay, Duration::from_secs(16));
        delay = policy.next(delay);
        assert_eq!(delay, Duration::from_secs(30));
        delay = policy.next(delay);
        assert_eq!(delay, Duration::from_secs(30));
    }

    #[test]
    fn connection_state_helpers() {
        assert!(ConnectionState::Connected.is_connected());
        assert!(!ConnectionState::Connecting.is_connected());
        assert!(ConnectionState::Closed.is_closed());
    }
}
