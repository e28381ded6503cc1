use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use utoipa::ToSchema;

use crate::bridge::source::{SourceError, TickSource};
use crate::models::InboundTick;
use crate::registry::{ConnectionRegistry, DispatchError};

/// Default capacity of the channel between the two bridge stages
///
/// Sized to absorb transport jitter without letting a stalled dispatch
/// stage buffer unbounded ticks.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 500;

/// Statistics for the ingestion bridge
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BridgeStats {
    /// Raw payloads received from the transport (lifetime)
    pub received: u64,
    /// Payloads that failed to decode and were skipped (lifetime)
    pub decode_failures: u64,
    /// Decoded ticks forwarded onto the internal channel (lifetime)
    pub forwarded: u64,
    /// Ticks dispatched into the registry (lifetime)
    pub dispatched: u64,
    /// Ticks for identities with no live session (lifetime, expected)
    pub unknown_sessions: u64,
}

#[derive(Default)]
struct CountersInner {
    received: AtomicU64,
    decode_failures: AtomicU64,
    forwarded: AtomicU64,
    dispatched: AtomicU64,
    unknown_sessions: AtomicU64,
}

/// Cloneable live view of the bridge counters
#[derive(Clone, Default)]
pub struct BridgeCounters {
    inner: Arc<CountersInner>,
}

impl BridgeCounters {
    pub fn snapshot(&self) -> BridgeStats {
        BridgeStats {
            received: self.inner.received.load(Ordering::Relaxed),
            decode_failures: self.inner.decode_failures.load(Ordering::Relaxed),
            forwarded: self.inner.forwarded.load(Ordering::Relaxed),
            dispatched: self.inner.dispatched.load(Ordering::Relaxed),
            unknown_sessions: self.inner.unknown_sessions.load(Ordering::Relaxed),
        }
    }
}

/// Two-stage pipeline moving ticks from the message bus into the registry
///
/// The subscribe stage decodes raw payloads onto a bounded channel; the
/// dispatch stage drains it into `ConnectionRegistry::dispatch`. The stages
/// are joined only by that channel and stopped only by the cancellation
/// token — never by closing the channel, since both stages hold an end of
/// it. Stopping the bridge leaves client sessions untouched.
pub struct IngestionBridge {
    counters: BridgeCounters,
    subscriber: JoinHandle<u64>,
    dispatcher: JoinHandle<u64>,
}

impl IngestionBridge {
    /// Spawn both stages with the default channel capacity
    pub fn start<S: TickSource>(
        source: S,
        registry: Arc<ConnectionRegistry>,
        cancel: CancellationToken,
    ) -> Self {
        Self::with_channel_capacity(source, registry, cancel, DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_channel_capacity<S: TickSource>(
        source: S,
        registry: Arc<ConnectionRegistry>,
        cancel: CancellationToken,
        capacity: usize,
    ) -> Self {
        let (tick_tx, tick_rx) = mpsc::channel(capacity);
        let counters = BridgeCounters::default();

        let subscriber = tokio::spawn(run_subscriber(
            source,
            tick_tx,
            cancel.clone(),
            counters.clone(),
        ));
        let dispatcher = tokio::spawn(run_dispatcher(
            tick_rx,
            registry,
            cancel,
            counters.clone(),
        ));

        info!("ingestion bridge started");

        Self {
            counters,
            subscriber,
            dispatcher,
        }
    }

    /// Live counter handle for the stats endpoint
    pub fn counters(&self) -> BridgeCounters {
        self.counters.clone()
    }

    pub fn stats(&self) -> BridgeStats {
        self.counters.snapshot()
    }

    /// Wait for both stages to stop; returns their processed-message counts
    ///
    /// Call after cancelling the token passed to `start`.
    pub async fn join(self) -> (u64, u64) {
        let subscribed = self.subscriber.await.unwrap_or(0);
        let dispatched = self.dispatcher.await.unwrap_or(0);
        (subscribed, dispatched)
    }
}

/// Subscribe stage: transport → decode → internal channel
pub(crate) async fn run_subscriber<S: TickSource>(
    mut source: S,
    tick_tx: mpsc::Sender<InboundTick>,
    cancel: CancellationToken,
    counters: BridgeCounters,
) -> u64 {
    let mut processed = 0u64;

    loop {
        let raw = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            raw = source.receive_next() => raw,
        };

        let payload = match raw {
            Ok(payload) => payload,
            Err(SourceError::Closed) => {
                warn!("tick subscription ended");
                break;
            }
            Err(e) => {
                error!(error = %e, "tick receive failed, subscription continues");
                continue;
            }
        };

        counters.inner.received.fetch_add(1, Ordering::Relaxed);

        let tick: InboundTick = match serde_json::from_slice(&payload) {
            Ok(tick) => tick,
            Err(e) => {
                counters.inner.decode_failures.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "malformed tick payload skipped");
                continue;
            }
        };

        // A full channel must not hold the stage hostage past cancellation
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            sent = tick_tx.send(tick) => {
                if sent.is_err() {
                    warn!("dispatch stage gone, stopping subscription");
                    break;
                }
                counters.inner.forwarded.fetch_add(1, Ordering::Relaxed);
                processed += 1;
            }
        }
    }

    info!(processed, "subscribe stage stopped");
    processed
}

/// Dispatch stage: internal channel → connection registry
pub(crate) async fn run_dispatcher(
    mut tick_rx: mpsc::Receiver<InboundTick>,
    registry: Arc<ConnectionRegistry>,
    cancel: CancellationToken,
    counters: BridgeCounters,
) -> u64 {
    let mut processed = 0u64;

    loop {
        let tick = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            tick = tick_rx.recv() => match tick {
                Some(tick) => tick,
                None => break,
            },
        };

        processed += 1;
        let (user_id, price_tick) = tick.into_parts();

        match registry.dispatch(user_id, &price_tick) {
            Ok(()) => {
                counters.inner.dispatched.fetch_add(1, Ordering::Relaxed);
            }
            // Ticks routinely outlive their session; counted, not logged
            Err(DispatchError::SessionNotFound(_)) => {
                counters.inner.unknown_sessions.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                error!(user_id = %user_id, error = %e, "dispatch failed");
            }
        }
    }

    info!(processed, "dispatch stage stopped");
    processed
}
