use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Identity of one logical user session
///
/// Exactly one live WebSocket session may exist per `UserId` at a time;
/// the connection registry enforces this on registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

impl UserId {
    /// Generate a fresh random identity
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for UserId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl From<Uuid> for UserId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// A single position in a user's portfolio
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Holding {
    pub symbol: String,
    pub quantity: Decimal,
}

impl Holding {
    pub fn new(symbol: impl Into<String>, quantity: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            quantity,
        }
    }
}

/// Ordered list of a user's holdings
///
/// Loaded once at registration time and immutable for the lifetime of the
/// session; a user who changes holdings picks them up on reconnect.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HoldingsSnapshot {
    positions: Vec<Holding>,
}

impl HoldingsSnapshot {
    pub fn new(positions: Vec<Holding>) -> Self {
        Self { positions }
    }

    /// Whether the user holds the given symbol
    pub fn holds(&self, symbol: &str) -> bool {
        self.positions.iter().any(|h| h.symbol == symbol)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Holding> {
        self.positions.iter()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

impl FromIterator<Holding> for HoldingsSnapshot {
    fn from_iter<T: IntoIterator<Item = Holding>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
