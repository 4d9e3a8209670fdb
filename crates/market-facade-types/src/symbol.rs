//! Canonical `BASE-QUOTE` symbol handling.
//!
//! Every adapter owns a bijection between its wire-format symbols (e.g.
//! Kraken's `XXBTZUSD`, Binance's `BTCUSDT`, OKX's `BTC-USDT-SWAP`) and the
//! canonical uppercase `BASE-QUOTE` form used everywhere in this crate.

use crate::error::DataError;
use std::fmt;

/// Quote currencies accepted by the domain's USD constraint.
pub const ACCEPTED_QUOTES: [&str; 3] = ["USD", "USDT", "USDC"];

/// A venue-agnostic `BASE-QUOTE` symbol, e.g. `BTC-USD`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub struct CanonicalSymbol {
    base: String,
    quote: String,
}

impl CanonicalSymbol {
    /// Parses and validates a canonical symbol string, enforcing the
    /// domain's USD constraint (quote must be USD, USDT, or USDC).
    pub fn parse(s: &str) -> Result<Self, DataError> {
        let (base, quote) = s
            .split_once('-')
            .ok_or_else(|| DataError::MalformedSymbol(s.to_string()))?;

        if base.is_empty()
            || quote.is_empty()
            || !base.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
            || !quote.chars().all(|c| c.is_ascii_uppercase())
        {
            return Err(DataError::MalformedSymbol(s.to_string()));
        }

        if !ACCEPTED_QUOTES.contains(&quote) {
            return Err(DataError::NonUsdQuote {
                quote: quote.to_string(),
            });
        }

        Ok(Self {
            base: base.to_string(),
            quote: quote.to_string(),
        })
    }

    /// Constructs a symbol without re-validating, for adapters that already
    /// hold validated `(base, quote)` pairs.
    pub fn new_unchecked(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            quote: quote.into(),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn quote(&self) -> &str {
        &self.quote
    }
}

impl fmt::Display for CanonicalSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.base, self.quote)
    }
}

impl TryFrom<String> for CanonicalSymbol {
    type Error = DataError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CanonicalSymbol> for String {
    fn from(value: CanonicalSymbol) -> Self {
        value.to_string()
    }
}

/// A bijection between a venue's wire-format symbols and canonical form.
///
/// Adapters own one of these. The round-trip law in the spec
/// (`normalize(venue_symbol(s)) == s`) must hold for every symbol the
/// adapter advertises as supported.
pub trait VenueSymbolMap: Send + Sync {
    /// Converts a canonical symbol to this venue's wire format.
    fn to_venue(&self, symbol: &CanonicalSymbol) -> Result<String, DataError>;

    /// Converts this venue's wire-format symbol back to canonical form.
    fn to_canonical(&self, venue_symbol: &str) -> Result<CanonicalSymbol, DataError>;

    /// The canonical symbols this venue advertises support for.
    fn supported_symbols(&self) -> Vec<CanonicalSymbol>;
}
