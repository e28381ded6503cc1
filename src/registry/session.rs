use bytes::Bytes;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::models::{HoldingsSnapshot, PriceTick, UserId};
use crate::registry::connection::ClientConnection;
use crate::valuation::{revalue, ValuationSnapshot};

/// One connected subscriber: holdings, live prices, and the delivery queue
///
/// Ownership is split three ways with no further locking between them:
/// the registry owns the map entry, the dispatch path is the only price
/// cache mutator, and the writer task is the only queue consumer.
pub struct ClientSession {
    user_id: UserId,
    holdings: HoldingsSnapshot,
    /// symbol → latest known price; key set bounded by the holdings
    prices: Mutex<HashMap<String, Decimal>>,
    outbound: mpsc::Sender<Bytes>,
    cancel: CancellationToken,
}

impl ClientSession {
    /// Create the session and start its writer task
    ///
    /// The writer takes exclusive ownership of the connection handle and
    /// runs until the session is cancelled, the queue closes, or a write
    /// fails. Exactly one writer exists per session.
    pub(crate) fn spawn(
        user_id: UserId,
        holdings: HoldingsSnapshot,
        connection: Box<dyn ClientConnection>,
        queue_capacity: usize,
    ) -> Arc<Self> {
        let (outbound, outbound_rx) = mpsc::channel(queue_capacity);
        let cancel = CancellationToken::new();

        let session = Arc::new(Self {
            user_id,
            holdings,
            prices: Mutex::new(HashMap::new()),
            outbound,
            cancel: cancel.clone(),
        });

        tokio::spawn(run_writer(user_id, outbound_rx, connection, cancel));

        session
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn holdings(&self) -> &HoldingsSnapshot {
        &self.holdings
    }

    /// Record the tick in the live price cache and recompute the valuation
    ///
    /// Called only from the dispatch path; the mutex is held across the
    /// (pure, non-blocking) revalue to keep cache and snapshot consistent.
    pub(crate) fn apply_tick(&self, tick: &PriceTick) -> ValuationSnapshot {
        let mut prices = self.prices.lock();
        prices.insert(tick.symbol.clone(), tick.price);
        revalue(self.user_id, tick.event_time, &self.holdings, &prices)
    }

    /// Non-blocking enqueue; returns false when the frame was dropped
    ///
    /// A full queue drops the newest frame: snapshots are full-state
    /// replacements, so the client converges on the next enqueue that
    /// succeeds.
    pub(crate) fn enqueue(&self, frame: Bytes) -> bool {
        match self.outbound.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!(user_id = %self.user_id, "outbound queue full, dropping snapshot");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Stop the writer task; the writer closes the connection on exit
    pub(crate) fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Drain the outbound queue into the connection until shutdown
///
/// Cancellation is checked before every write so nothing is delivered after
/// the session is torn down, even with frames still queued. Every exit path
/// closes the connection; the registry entry is the caller's problem.
async fn run_writer(
    user_id: UserId,
    mut outbound_rx: mpsc::Receiver<Bytes>,
    mut connection: Box<dyn ClientConnection>,
    cancel: CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            biased;

            _ = cancel.cancelled() => break,

            frame = outbound_rx.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
        };

        // The write itself also yields to cancellation, so teardown is not
        // held up by a peer that stopped reading mid-frame
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break,

            result = connection.write_frame(frame) => {
                if let Err(e) = result {
                    warn!(user_id = %user_id, error = %e, "connection write failed, stopping writer");
                    cancel.cancel();
                    break;
                }
            }
        }
    }

    connection.close().await;
    debug!(user_id = %user_id, "writer task stopped");
}
