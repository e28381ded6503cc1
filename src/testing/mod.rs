pub mod producer;
pub mod source;

pub use producer::{ProducerConfig, TickProducer};
pub use source::ChannelTickSource;
