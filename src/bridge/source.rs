use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Errors from the publish/subscribe transport
#[derive(Debug, Error)]
pub enum SourceError {
    /// A single receive failed; the subscription itself may still be alive
    #[error("transport receive failed: {0}")]
    Transport(String),

    /// The subscription stream ended and will produce nothing further
    #[error("subscription stream ended")]
    Closed,
}

/// Blocking-with-cancellation receive primitive over the message bus
///
/// The subscribe stage owns the source exclusively and drives it from a
/// select loop, so `receive_next` futures may be dropped mid-flight on
/// cancellation. Implementations: the RabbitMQ consumer and the in-process
/// channel source used by tests and the sim feed.
#[async_trait]
pub trait TickSource: Send + 'static {
    /// Wait for the next raw payload from the subscription
    async fn receive_next(&mut self) -> Result<Bytes, SourceError>;
}
