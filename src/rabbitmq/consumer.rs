use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use lapin::{
    options::*, types::FieldTable, Channel, Connection, ConnectionProperties, Consumer,
    ExchangeKind,
};
use std::time::Duration;

use crate::bridge::{SourceError, TickSource};
use super::config::RabbitMQConfig;

/// Error types for RabbitMQ operations
#[derive(Debug, thiserror::Error)]
pub enum RabbitMQError {
    #[error("Connection error: {0}")]
    Connection(#[from] lapin::Error),

    #[error("Connection timed out after {0}s")]
    Timeout(u64),
}

pub type Result<T> = std::result::Result<T, RabbitMQError>;

/// RabbitMQ-backed tick source
///
/// Binds a broker-managed exclusive queue to the tick exchange and consumes
/// with auto-ack: delivery is at most once, which matches the stream's
/// no-durability contract — a missed snapshot is replaced by the next one.
pub struct RabbitMQTickSource {
    consumer: Consumer,
    // Held so the AMQP connection outlives the consumer stream
    _channel: Channel,
    _connection: Connection,
}

impl RabbitMQTickSource {
    /// Connect and establish the subscription
    ///
    /// Failure here is fatal to the feed (there is nothing to read from);
    /// callers decide whether to run without one.
    pub async fn connect(config: &RabbitMQConfig) -> Result<Self> {
        tracing::info!(uri = %config.uri, "Connecting to RabbitMQ");

        let connection = tokio::time::timeout(
            Duration::from_secs(config.connection_timeout_secs),
            Connection::connect(&config.uri, ConnectionProperties::default()),
        )
        .await
        .map_err(|_| RabbitMQError::Timeout(config.connection_timeout_secs))??;

        let channel = connection.create_channel().await?;

        channel
            .exchange_declare(
                &config.exchange,
                parse_exchange_type(&config.exchange_type),
                ExchangeDeclareOptions {
                    durable: config.durable,
                    auto_delete: false,
                    internal: false,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;

        let queue = channel
            .queue_declare(
                &config.queue,
                QueueDeclareOptions {
                    exclusive: true,
                    auto_delete: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;

        channel
            .queue_bind(
                queue.name().as_str(),
                &config.exchange,
                &config.routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await?;

        let consumer = channel
            .basic_consume(
                queue.name().as_str(),
                "portfolio-stream",
                BasicConsumeOptions {
                    no_ack: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;

        tracing::info!(
            exchange = %config.exchange,
            queue = %queue.name(),
            routing_key = %config.routing_key,
            "Subscribed to tick stream"
        );

        Ok(Self {
            consumer,
            _channel: channel,
            _connection: connection,
        })
    }
}

#[async_trait]
impl TickSource for RabbitMQTickSource {
    async fn receive_next(&mut self) -> std::result::Result<Bytes, SourceError> {
        match self.consumer.next().await {
            Some(Ok(delivery)) => Ok(Bytes::from(delivery.data)),
            Some(Err(e)) => Err(SourceError::Transport(e.to_string())),
            None => Err(SourceError::Closed),
        }
    }
}

fn parse_exchange_type(exchange_type: &str) -> ExchangeKind {
    match exchange_type {
        "direct" => ExchangeKind::Direct,
        "fanout" => ExchangeKind::Fanout,
        "headers" => ExchangeKind::Headers,
        _ => ExchangeKind::Topic,
    }
}
