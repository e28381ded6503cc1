use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::holding::UserId;

/// A single price update for one traded symbol
///
/// Ephemeral: consumed by exactly one dispatch and never stored beyond the
/// session's live price cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceTick {
    pub symbol: String,
    pub price: Decimal,
    pub event_time: DateTime<Utc>,
}

impl PriceTick {
    pub fn new(symbol: impl Into<String>, price: Decimal, event_time: DateTime<Utc>) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            event_time,
        }
    }
}

/// Wire form of a tick as published on the message bus
///
/// The upstream aggregator resolves which user a tick is relevant to and
/// stamps the payload with that identity, so the dispatch stage never has
/// to consult the holdings store per tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundTick {
    pub user_id: UserId,
    pub symbol: String,
    pub price: Decimal,
    pub event_time: DateTime<Utc>,
}

impl InboundTick {
    pub fn into_parts(self) -> (UserId, PriceTick) {
        (
            self.user_id,
            PriceTick {
                symbol: self.symbol,
                price: self.price,
                event_time: self.event_time,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_inbound_tick_decode() {
        let raw = r#"{
            "user_id": "7f6cdafa-1c3f-4f9d-9f53-1df618d0b0a8",
            "symbol": "BTC",
            "price": "50000.25",
            "event_time": "2024-06-01T12:00:00Z"
        }"#;

        let tick: InboundTick = serde_json::from_str(raw).unwrap();
        assert_eq!(tick.symbol, "BTC");
        assert_eq!(tick.price, dec!(50000.25));

        let (user_id, price_tick) = tick.into_parts();
        assert_eq!(
            user_id.to_string(),
            "7f6cdafa-1c3f-4f9d-9f53-1df618d0b0a8"
        );
        assert_eq!(price_tick.symbol, "BTC");
    }

    #[test]
    fn test_inbound_tick_numeric_price() {
        // Upstream producers are allowed to send the price as a JSON number
        let raw = r#"{
            "user_id": "7f6cdafa-1c3f-4f9d-9f53-1df618d0b0a8",
            "symbol": "ETH",
            "price": 3000.5,
            "event_time": "2024-06-01T12:00:00Z"
        }"#;

        let tick: InboundTick = serde_json::from_str(raw).unwrap();
        assert_eq!(tick.price, dec!(3000.5));
    }
}
