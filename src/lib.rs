// Library Crate Root
// lib.rs

pub mod api;
pub mod bridge;
pub mod holdings;
pub mod models;
pub mod rabbitmq;
pub mod registry;
pub mod testing;
pub mod valuation;
pub mod websocket;

// Re-exports at crate root
pub use api::create_router;
pub use bridge::{IngestionBridge, TickSource};
pub use models::{Holding, HoldingsSnapshot, InboundTick, PriceTick, UserId};
pub use registry::{ConnectionRegistry, DispatchError};
pub use valuation::{revalue, ValuationSnapshot};
