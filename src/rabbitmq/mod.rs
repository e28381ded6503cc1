pub mod config;
pub mod consumer;

pub use config::RabbitMQConfig;
pub use consumer::{RabbitMQError, RabbitMQTickSource};
