use bytes::Bytes;
use chrono::Utc;
use rand::Rng;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::models::{InboundTick, UserId};

/// Configuration for simulated tick generation
#[derive(Debug, Clone)]
pub struct ProducerConfig {
    /// Starting price range for symbols without history
    pub min_price: f64,
    pub max_price: f64,

    /// Largest per-tick move, as a fraction of the current price
    pub max_step_pct: f64,

    /// Delay between generated ticks
    pub tick_interval_ms: u64,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            min_price: 100.0,
            max_price: 60_000.0,
            max_step_pct: 0.005,
            tick_interval_ms: 250,
        }
    }
}

/// Random-walk tick producer for the sim feed
///
/// Emits the same wire JSON the RabbitMQ feed carries, so everything
/// downstream of the transport is exercised unchanged.
pub struct TickProducer {
    config: ProducerConfig,
    /// Each entry is one target user and the symbols to tick for them
    users: Vec<(UserId, Vec<String>)>,
    last_prices: HashMap<String, f64>,
}

impl TickProducer {
    pub fn new(config: ProducerConfig, users: Vec<(UserId, Vec<String>)>) -> Self {
        Self {
            config,
            users,
            last_prices: HashMap::new(),
        }
    }

    /// Generate the next tick; None when no users are configured
    pub fn next_tick(&mut self) -> Option<InboundTick> {
        if self.users.is_empty() {
            return None;
        }

        let mut rng = rand::rng();

        let (user_id, symbols) = &self.users[rng.random_range(0..self.users.len())];
        if symbols.is_empty() {
            return None;
        }
        let symbol = &symbols[rng.random_range(0..symbols.len())];

        let price = match self.last_prices.get(symbol) {
            Some(last) => {
                let step = rng.random_range(-self.config.max_step_pct..self.config.max_step_pct);
                last * (1.0 + step)
            }
            None => rng.random_range(self.config.min_price..self.config.max_price),
        };
        self.last_prices.insert(symbol.clone(), price);

        let price = Decimal::from_f64_retain(price)
            .map(|d| d.round_dp(2))
            .unwrap_or(Decimal::ONE);

        Some(InboundTick {
            user_id: *user_id,
            symbol: symbol.clone(),
            price,
            event_time: Utc::now(),
        })
    }

    /// Run the producer until cancelled; returns the number of ticks sent
    pub fn spawn(
        mut self,
        feed_tx: mpsc::Sender<Bytes>,
        cancel: CancellationToken,
    ) -> JoinHandle<u64> {
        tokio::spawn(async move {
            info!(
                users = self.users.len(),
                interval_ms = self.config.tick_interval_ms,
                "tick producer started"
            );

            let mut ticker = interval(Duration::from_millis(self.config.tick_interval_ms));
            let mut produced = 0u64;

            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let Some(tick) = self.next_tick() else { break };

                let payload = match serde_json::to_vec(&tick) {
                    Ok(payload) => Bytes::from(payload),
                    Err(e) => {
                        warn!(error = %e, "failed to encode generated tick");
                        continue;
                    }
                };

                if feed_tx.send(payload).await.is_err() {
                    break;
                }
                produced += 1;
            }

            info!(produced, "tick producer stopped");
            produced
        })
    }
}
