use portfolio_stream_api::bridge::DEFAULT_CHANNEL_CAPACITY;
use portfolio_stream_api::holdings::InMemoryHoldingsProvider;
use portfolio_stream_api::models::{Holding, HoldingsSnapshot, UserId};
use portfolio_stream_api::testing::{ChannelTickSource, ProducerConfig, TickProducer};
use portfolio_stream_api::{create_router, ConnectionRegistry, IngestionBridge};
use rust_decimal_macros::dec;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Seed a demo portfolio and return the user id and its symbols
fn seed_user(
    provider: &InMemoryHoldingsProvider,
    positions: Vec<Holding>,
) -> (UserId, Vec<String>) {
    let user_id = UserId::new();
    let symbols = positions.iter().map(|h| h.symbol.clone()).collect();
    provider.insert(user_id, HoldingsSnapshot::new(positions));
    (user_id, symbols)
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "portfolio_stream_api=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!("🚀 Starting Sim Feed Server (no broker required)\n");

    let registry = Arc::new(ConnectionRegistry::new());
    let holdings = Arc::new(InMemoryHoldingsProvider::new());

    // Two demo portfolios; connect with either id to watch valuations move
    let alice = seed_user(
        &holdings,
        vec![Holding::new("BTC", dec!(2)), Holding::new("ETH", dec!(15))],
    );
    let bob = seed_user(
        &holdings,
        vec![
            Holding::new("ETH", dec!(4.5)),
            Holding::new("SOL", dec!(300)),
            Holding::new("DOGE", dec!(25000)),
        ],
    );

    println!("👤 Demo users:");
    for (user_id, symbols) in [&alice, &bob] {
        println!("   ws://127.0.0.1:3000/ws?user_id={}  ({})", user_id, symbols.join(", "));
    }
    println!();

    // Simulated feed wired through the same bridge the broker would use
    let (feed_tx, source) = ChannelTickSource::new(DEFAULT_CHANNEL_CAPACITY);
    let cancel = CancellationToken::new();

    let bridge = IngestionBridge::start(source, registry.clone(), cancel.clone());
    let producer = TickProducer::new(ProducerConfig::default(), vec![alice, bob]);
    let producer_handle = producer.spawn(feed_tx, cancel.clone());

    let app = create_router(registry, holdings, Some(bridge.counters()));

    let addr = "127.0.0.1:3000";
    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    tracing::info!("🔌 WebSocket: ws://{}/ws?user_id=<uuid>", addr);
    tracing::info!("📚 Swagger UI: http://{}/swagger-ui", addr);

    let shutdown = cancel.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            shutdown.cancel();
        })
        .await
        .unwrap();

    cancel.cancel();
    let produced = producer_handle.await.unwrap_or(0);
    let (subscribed, dispatched) = bridge.join().await;
    tracing::info!(produced, subscribed, dispatched, "sim feed stopped");
}
