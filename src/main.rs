use portfolio_stream_api::holdings::InMemoryHoldingsProvider;
use portfolio_stream_api::rabbitmq::{RabbitMQConfig, RabbitMQTickSource};
use portfolio_stream_api::registry::DEFAULT_OUTBOUND_CAPACITY;
use portfolio_stream_api::bridge::DEFAULT_CHANNEL_CAPACITY;
use portfolio_stream_api::{create_router, ConnectionRegistry, IngestionBridge};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Load environment variables from .env file (if present)
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "portfolio_stream_api=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Create the connection registry
    let queue_capacity = std::env::var("OUTBOUND_QUEUE_CAPACITY")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_OUTBOUND_CAPACITY);
    let registry = Arc::new(ConnectionRegistry::with_queue_capacity(queue_capacity));

    // Holdings provider; production deployments implement HoldingsProvider
    // over their profile service and wire it here
    let holdings = Arc::new(InMemoryHoldingsProvider::new());

    // Process-wide stop signal for the ingestion bridge
    let cancel = CancellationToken::new();

    // Attach the RabbitMQ tick feed if configured
    let bridge = initialize_feed(registry.clone(), cancel.clone()).await;
    let bridge_counters = bridge.as_ref().map(|b| b.counters());

    // Create the router with WebSocket support and monitoring endpoints
    let app = create_router(registry.clone(), holdings, bridge_counters);

    // Define the address
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();

    tracing::info!("🚀 Portfolio Stream API running on http://{}", addr);
    tracing::info!("📊 Health check: http://{}/api/v1/health", addr);
    tracing::info!("📚 Swagger UI: http://{}/swagger-ui", addr);
    tracing::info!("🔌 WebSocket: ws://{}/ws?user_id=<uuid>", addr);
    tracing::info!("");
    tracing::info!("   Manual tick dispatch:");
    tracing::info!(
        r#"   curl -X POST http://{}/api/v1/ticks -H 'content-type: application/json' \"#,
        addr
    );
    tracing::info!(r#"        -d '{{"user_id":"<uuid>","symbol":"BTC","price":"50000"}}'"#);

    // Serve until ctrl-c; the bridge stops first, sessions drain with the server
    let shutdown = cancel.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("👾 Received shutdown signal");
            shutdown.cancel();
        })
        .await
        .unwrap();

    cancel.cancel();
    if let Some(bridge) = bridge {
        let (subscribed, dispatched) = bridge.join().await;
        tracing::info!(subscribed, dispatched, "ingestion bridge stopped");
    }
    tracing::info!("🏁 Shutdown complete");
}

/// Connect the RabbitMQ feed and start the ingestion bridge
///
/// A missing RABBITMQ_URI means no feed: the server still accepts clients
/// (and manual tick injection), it just receives no bus traffic. A failed
/// subscription is logged the same way — retry policy lives with the
/// transport, not here.
async fn initialize_feed(
    registry: Arc<ConnectionRegistry>,
    cancel: CancellationToken,
) -> Option<IngestionBridge> {
    let Some(config) = RabbitMQConfig::from_env() else {
        tracing::info!("🐰 RabbitMQ: Not configured (RABBITMQ_URI not set)");
        tracing::info!("   Clients can connect; ticks only arrive via POST /api/v1/ticks");
        return None;
    };

    tracing::info!("🐰 RabbitMQ: Connecting...");
    tracing::info!("   Exchange: {}", config.exchange);
    tracing::info!("   Routing key: {}", config.routing_key);

    let source = match RabbitMQTickSource::connect(&config).await {
        Ok(source) => source,
        Err(e) => {
            tracing::error!("❌ RabbitMQ: Subscription failed: {}", e);
            tracing::warn!("   Server starts without a tick feed");
            return None;
        }
    };

    let channel_capacity = std::env::var("TICK_CHANNEL_CAPACITY")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_CHANNEL_CAPACITY);

    tracing::info!("📡 Ingestion bridge starting (channel capacity {})", channel_capacity);

    Some(IngestionBridge::with_channel_capacity(
        source,
        registry,
        cancel,
        channel_capacity,
    ))
}
