pub mod holding;
pub mod tick;

pub use holding::{Holding, HoldingsSnapshot, UserId};
pub use tick::{InboundTick, PriceTick};
