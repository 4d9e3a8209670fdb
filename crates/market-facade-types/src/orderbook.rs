use crate::error::DataError;
use crate::provenance::Provenance;
use crate::symbol::CanonicalSymbol;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// A single price/size level in an order book.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PriceLevel {
    pub price: Decimal,
    pub size: Decimal,
}

impl PriceLevel {
    pub fn new(price: Decimal, size: Decimal) -> Self {
        Self { price, size }
    }
}

/// A venue's order book at a point in time.
///
/// `bids` are sorted descending by price, `asks` ascending, and the
/// best bid must be strictly less than the best ask — an order book that
/// violates this is rejected at construction rather than passed downstream
/// silently crossed.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OrderBookSnapshot {
    pub venue: String,
    pub symbol: CanonicalSymbol,
    pub timestamp: DateTime<Utc>,
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
    /// Venue-assigned sequence number for this book update, when the venue
    /// provides one.
    pub update_id: Option<u64>,
    pub provenance: Provenance,
}

impl OrderBookSnapshot {
    /// Builds a snapshot, validating sort order and the no-cross invariant.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        venue: impl Into<String>,
        symbol: CanonicalSymbol,
        timestamp: DateTime<Utc>,
        bids: Vec<PriceLevel>,
        asks: Vec<PriceLevel>,
        update_id: Option<u64>,
        provenance: Provenance,
    ) -> Result<Self, DataError> {
        if !bids.windows(2).all(|w| w[0].price >= w[1].price) {
            return Err(DataError::InvariantViolation(
                "bids are not sorted descending by price".to_string(),
            ));
        }
        if !asks.windows(2).all(|w| w[0].price <= w[1].price) {
            return Err(DataError::InvariantViolation(
                "asks are not sorted ascending by price".to_string(),
            ));
        }
        if let (Some(best_bid), Some(best_ask)) = (bids.first(), asks.first()) {
            if best_bid.price >= best_ask.price {
                return Err(DataError::InvariantViolation(format!(
                    "crossed book: best_bid {} >= best_ask {}",
                    best_bid.price, best_ask.price
                )));
            }
        }

        Ok(Self {
            venue: venue.into(),
            symbol,
            timestamp,
            bids,
            asks,
            update_id,
            provenance,
        })
    }

    pub fn best_bid(&self) -> Option<&PriceLevel> {
        self.bids.first()
    }

    pub fn best_ask(&self) -> Option<&PriceLevel> {
        self.asks.first()
    }

    /// Midpoint of the best bid and best ask, if both sides are populated.
    pub fn mid(&self) -> Option<Decimal> {
        let bid = self.best_bid()?.price;
        let ask = self.best_ask()?.price;
        Some((bid + ask) / Decimal::from(2))
    }

    /// Spread expressed in basis points of the midpoint.
    pub fn spread_bps(&self) -> Option<Decimal> {
        let bid = self.best_bid()?.price;
        let ask = self.best_ask()?.price;
        let mid = self.mid()?;
        if mid.is_zero() {
            return None;
        }
        Some((ask - bid) / mid * Decimal::from(10_000))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn prov() -> Provenance {
        Provenance::live("test-venue", Utc::now())
    }

    fn sym() -> CanonicalSymbol {
        CanonicalSymbol::parse("BTC-USD").unwrap()
    }

    #[test]
    fn builds_valid_book() {
        let book = OrderBookSnapshot::new(
            "test-venue",
            sym(),
            Utc::now(),
            vec![PriceLevel::new(Decimal::new(100, 0), Decimal::new(1, 0))],
            vec![PriceLevel::new(Decimal::new(101, 0), Decimal::new(1, 0))],
            Some(1),
            prov(),
        )
        .unwrap();
        assert_eq!(book.mid(), Some(Decimal::new(1005, 1)));
    }

    #[test]
    fn rejects_crossed_book() {
        let err = OrderBookSnapshot::new(
            "test-venue",
            sym(),
            Utc::now(),
            vec![PriceLevel::new(Decimal::new(101, 0), Decimal::new(1, 0))],
            vec![PriceLevel::new(Decimal::new(100, 0), Decimal::new(1, 0))],
            None,
            prov(),
        )
        .unwrap_err();
        assert!(matches!(err, DataError::InvariantViolation(_)));
    }

    #[test]
    fn rejects_unsorted_bids() {
        let err = OrderBookSnapshot::new(
            "test-venue",
            sym(),
            Utc::now(),
            vec![
                PriceLevel::new(Decimal::new(100, 0), Decimal::new(1, 0)),
                PriceLevel::new(Decimal::new(101, 0), Decimal::new(1, 0)),
            ],
            vec![],
            None,
            prov(),
        )
        .unwrap_err();
        assert!(matches!(err, DataError::InvariantViolation(_)));
    }
}
