//! Error types for the fallback chain.

use market_facade_registry::AdapterError;
use thiserror::Error;

/// Every venue in the chain failed; carries one diagnostic per venue, in the
/// order they were attempted.
#[derive(Debug, Error)]
#[error("all {} venue(s) in the chain failed", .attempts.len())]
pub struct AggregateFailure {
    pub attempts: Vec<(String, AdapterError)>,
}

impl AggregateFailure {
    pub fn venues(&self) -> impl Iterator<Item = &str> {
        self.attempts.iter().map(|(venue, _)| venue.as_str())
    }
}

/// Errors raised by [`crate::FallbackChain::fetch_with_fallback`].
#[derive(Debug, Error)]
pub enum FallbackError {
    /// The chain has no venues registered.
    #[error("fallback chain is empty")]
    EmptyChain,

    /// Every venue in the chain was tried and failed.
    #[error(transparent)]
    AllFailed(#[from] AggregateFailure),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_failure_lists_venues_in_order() {
        let failure = AggregateFailure {
            attempts: vec![
                ("binance".into(), AdapterError::msg("timeout")),
                ("kraken".into(), AdapterError::msg("circuit open")),
            ],
        };
        assert_eq!(failure.venues().collect::<Vec<_>>(), vec!["binance", "kraken"]);
        assert_eq!(failure.to_string(), "all 2 venue(s) in the chain failed");
    }
}
