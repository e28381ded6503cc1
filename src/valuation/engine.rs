use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::models::{HoldingsSnapshot, UserId};

/// Valued position for one held symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionValue {
    pub quantity: Decimal,
    pub price: Decimal,
    /// quantity × price
    pub value: Decimal,
}

/// Complete per-user valuation, delivered to the client as-is
///
/// A snapshot is a full-state replacement, never a delta: the client can
/// always discard whatever it previously rendered. Symbols the user holds
/// but for which no price has arrived yet are absent rather than
/// zero-filled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValuationSnapshot {
    pub user_id: UserId,
    pub as_of: DateTime<Utc>,
    pub positions: BTreeMap<String, PositionValue>,
}

impl ValuationSnapshot {
    pub fn total_value(&self) -> Decimal {
        self.positions.values().map(|p| p.value).sum()
    }
}

/// Recompute a user's valuation from their holdings and live prices
///
/// Pure function: includes exactly the symbols present in both the
/// holdings snapshot and the price cache. `as_of` is the event time of the
/// tick that triggered the recompute.
pub fn revalue(
    user_id: UserId,
    as_of: DateTime<Utc>,
    holdings: &HoldingsSnapshot,
    prices: &HashMap<String, Decimal>,
) -> ValuationSnapshot {
    let positions = holdings
        .iter()
        .filter_map(|holding| {
            prices.get(&holding.symbol).map(|price| {
                (
                    holding.symbol.clone(),
                    PositionValue {
                        quantity: holding.quantity,
                        price: *price,
                        value: holding.quantity * *price,
                    },
                )
            })
        })
        .collect();

    ValuationSnapshot {
        user_id,
        as_of,
        positions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Holding;
    use rust_decimal_macros::dec;

    fn holdings() -> HoldingsSnapshot {
        HoldingsSnapshot::new(vec![
            Holding::new("BTC", dec!(2)),
            Holding::new("ETH", dec!(10)),
            Holding::new("SOL", dec!(100)),
        ])
    }

    #[test]
    fn test_includes_only_priced_symbols() {
        let mut prices = HashMap::new();
        prices.insert("BTC".to_string(), dec!(50000));
        prices.insert("ETH".to_string(), dec!(3000));

        let snapshot = revalue(UserId::new(), Utc::now(), &holdings(), &prices);

        assert_eq!(snapshot.positions.len(), 2);
        assert!(snapshot.positions.contains_key("BTC"));
        assert!(snapshot.positions.contains_key("ETH"));
        // SOL has no known price yet and must be omitted, not zero-filled
        assert!(!snapshot.positions.contains_key("SOL"));
    }

    #[test]
    fn test_value_is_quantity_times_price() {
        let mut prices = HashMap::new();
        prices.insert("BTC".to_string(), dec!(50000));

        let snapshot = revalue(UserId::new(), Utc::now(), &holdings(), &prices);
        let btc = &snapshot.positions["BTC"];

        assert_eq!(btc.quantity, dec!(2));
        assert_eq!(btc.price, dec!(50000));
        assert_eq!(btc.value, dec!(100000));
        assert_eq!(snapshot.total_value(), dec!(100000));
    }

    #[test]
    fn test_ignores_unheld_prices() {
        let mut prices = HashMap::new();
        prices.insert("DOGE".to_string(), dec!(0.1));

        let snapshot = revalue(UserId::new(), Utc::now(), &holdings(), &prices);
        assert!(snapshot.positions.is_empty());
    }

    #[test]
    fn test_empty_holdings() {
        let mut prices = HashMap::new();
        prices.insert("BTC".to_string(), dec!(50000));

        let snapshot = revalue(
            UserId::new(),
            Utc::now(),
            &HoldingsSnapshot::default(),
            &prices,
        );
        assert!(snapshot.positions.is_empty());
        assert_eq!(snapshot.total_value(), Decimal::ZERO);
    }

    #[test]
    fn test_deterministic_key_order() {
        let mut prices = HashMap::new();
        prices.insert("SOL".to_string(), dec!(150));
        prices.insert("BTC".to_string(), dec!(50000));
        prices.insert("ETH".to_string(), dec!(3000));

        let snapshot = revalue(UserId::new(), Utc::now(), &holdings(), &prices);
        let keys: Vec<&str> = snapshot.positions.keys().map(String::as_str).collect();

        assert_eq!(keys, vec!["BTC", "ETH", "SOL"]);
    }
}
