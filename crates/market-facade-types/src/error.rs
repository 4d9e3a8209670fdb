use thiserror::Error;

/// Errors raised while constructing or validating canonical market-data types.
///
/// These are never a circuit-breaker failure signal (see `InvalidData` in the
/// facade's error kind table) — a poisoned payload means the venue sent
/// something structurally wrong, not that the venue is unavailable.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DataError {
    /// A canonical symbol did not match the `BASE-QUOTE` uppercase shape.
    #[error("malformed canonical symbol: {0:?}")]
    MalformedSymbol(String),

    /// The quote currency is not one of the accepted USD-pegged quotes.
    #[error("quote currency {quote:?} is not a USD-pegged quote (expected USD, USDT, or USDC)")]
    NonUsdQuote { quote: String },

    /// A venue-specific symbol has no known mapping to canonical form.
    #[error("no canonical mapping for venue symbol {0:?}")]
    UnmappedVenueSymbol(String),

    /// A canonical invariant was violated (e.g. best_bid >= best_ask).
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}
