pub mod source;
pub mod stages;

pub use source::{SourceError, TickSource};
pub use stages::{
    BridgeCounters, BridgeStats, IngestionBridge, DEFAULT_CHANNEL_CAPACITY,
};
