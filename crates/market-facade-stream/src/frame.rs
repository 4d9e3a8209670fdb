//! Canonical events carried over a subscription's delivery channel, and the
//! venue-transport frame shapes a [`crate::VenueStreamAdapter`] decodes raw
//! socket frames into.

use market_facade_types::{FundingRate, Kline, OpenInterest, OrderBookSnapshot, Trade};

/// A canonical market-data update delivered to subscribers.
#[derive(Debug, Clone)]
pub enum MarketEvent {
    OrderBook(OrderBookSnapshot),
    Trade(Trade),
    Kline(Kline),
    Funding(FundingRate),
    OpenInterest(OpenInterest),
}

/// The decoded shape of one inbound WebSocket frame, as classified by a
/// [`crate::VenueStreamAdapter`].
#[derive(Debug, Clone)]
pub enum StreamFrame {
    /// Venue confirmed a subscription; `correlation_id` echoes the value
    /// passed to `send_subscribe`, `channel_id` is the venue-assigned id
    /// future data frames for this subscription will carry.
    SubscribeAck { correlation_id: String, channel_id: String },

    /// Venue rejected a subscription.
    SubscribeNack { correlation_id: String, reason: String },

    /// A data update for an already-acknowledged channel.
    Data { channel_id: String, event: MarketEvent },

    /// A pong reply to our ping (or an unsolicited keepalive from the venue).
    Pong,
}
