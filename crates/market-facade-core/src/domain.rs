//! Vocabulary shared by every crate that talks about venues and their data.

use std::fmt;

/// The kinds of market data a venue adapter may support.
///
/// Used by the registry's `get_supporting` query and by the facade to decide
/// which venues are even eligible for a given operation before it bothers
/// acquiring a rate-limit token or asking the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    OrderBook,
    Trades,
    Klines,
    Funding,
    OpenInterest,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DataType::OrderBook => "order_book",
            DataType::Trades => "trades",
            DataType::Klines => "klines",
            DataType::Funding => "funding",
            DataType::OpenInterest => "open_interest",
        };
        f.write_str(s)
    }
}
