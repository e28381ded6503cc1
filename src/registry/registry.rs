use bytes::Bytes;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::models::{HoldingsSnapshot, PriceTick, UserId};
use crate::registry::connection::ClientConnection;
use crate::registry::session::ClientSession;

/// Default capacity of each session's outbound queue
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 100;

/// Errors from dispatching a tick to a subscriber
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No live session for this identity. Expected after a disconnect while
    /// ticks for the user are still in flight; callers count and move on.
    #[error("no active session for user {0}")]
    SessionNotFound(UserId),

    #[error("failed to encode valuation snapshot: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Statistics for the connection registry
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegistryStats {
    /// Number of live sessions
    pub session_count: usize,
    /// Snapshots enqueued for delivery (lifetime)
    pub total_dispatched: u64,
    /// Snapshots dropped because a session's queue was full (lifetime)
    pub total_dropped: u64,
    /// Ticks skipped because the user does not hold the symbol (lifetime)
    pub total_skipped: u64,
    /// Dispatches for identities with no live session (lifetime)
    pub unknown_dispatches: u64,
    /// Identities of the connected users
    pub connected_users: Vec<String>,
}

/// Concurrency-safe map of live client sessions
///
/// The single source of truth for who is currently connected. The lock
/// guards map operations only; dispatch clones the session Arc out and does
/// serialization and enqueueing with the lock released, so a slow client
/// can never extend the critical section.
pub struct ConnectionRegistry {
    sessions: RwLock<HashMap<UserId, Arc<ClientSession>>>,
    queue_capacity: usize,

    total_dispatched: AtomicU64,
    total_dropped: AtomicU64,
    total_skipped: AtomicU64,
    unknown_dispatches: AtomicU64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::with_queue_capacity(DEFAULT_OUTBOUND_CAPACITY)
    }

    pub fn with_queue_capacity(queue_capacity: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            queue_capacity,
            total_dispatched: AtomicU64::new(0),
            total_dropped: AtomicU64::new(0),
            total_skipped: AtomicU64::new(0),
            unknown_dispatches: AtomicU64::new(0),
        }
    }

    /// Register a subscriber and start its writer task
    ///
    /// Latest registration wins: an existing session for the same identity
    /// is removed from the map in the same critical section and torn down
    /// once the lock is released, so two writers never serve one identity.
    pub fn register(
        &self,
        user_id: UserId,
        holdings: HoldingsSnapshot,
        connection: Box<dyn ClientConnection>,
    ) {
        let session = ClientSession::spawn(user_id, holdings, connection, self.queue_capacity);

        let previous = self.sessions.write().insert(user_id, session);

        if let Some(previous) = previous {
            warn!(user_id = %user_id, "duplicate registration, replacing live session");
            previous.shutdown();
        }

        info!(user_id = %user_id, "session registered");
    }

    /// Remove a subscriber and tear its session down
    ///
    /// No-op for unknown identities; safe to call concurrently with
    /// dispatch. The writer task closes the connection on its way out.
    pub fn unregister(&self, user_id: UserId) {
        let removed = self.sessions.write().remove(&user_id);

        if let Some(session) = removed {
            session.shutdown();
            info!(user_id = %user_id, "session unregistered");
        }
    }

    /// Apply one tick to one subscriber and queue the resulting snapshot
    ///
    /// Never blocks: the outbound enqueue is try_send with drop-newest on
    /// overflow. A tick for a symbol the user does not hold produces no
    /// delivery at all.
    pub fn dispatch(&self, user_id: UserId, tick: &PriceTick) -> Result<(), DispatchError> {
        let session = self.sessions.read().get(&user_id).cloned();

        let session = match session {
            Some(session) if !session.is_closed() => session,
            _ => {
                self.unknown_dispatches.fetch_add(1, Ordering::Relaxed);
                return Err(DispatchError::SessionNotFound(user_id));
            }
        };

        if !session.holdings().holds(&tick.symbol) {
            self.total_skipped.fetch_add(1, Ordering::Relaxed);
            debug!(user_id = %user_id, symbol = %tick.symbol, "tick for unheld symbol skipped");
            return Ok(());
        }

        let snapshot = session.apply_tick(tick);
        let frame = Bytes::from(serde_json::to_vec(&snapshot)?);

        if session.enqueue(frame) {
            self.total_dispatched.fetch_add(1, Ordering::Relaxed);
        } else {
            self.total_dropped.fetch_add(1, Ordering::Relaxed);
        }

        Ok(())
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_connected(&self, user_id: UserId) -> bool {
        self.sessions.read().contains_key(&user_id)
    }

    /// Get registry statistics
    pub fn stats(&self) -> RegistryStats {
        let sessions = self.sessions.read();

        RegistryStats {
            session_count: sessions.len(),
            total_dispatched: self.total_dispatched.load(Ordering::Relaxed),
            total_dropped: self.total_dropped.load(Ordering::Relaxed),
            total_skipped: self.total_skipped.load(Ordering::Relaxed),
            unknown_dispatches: self.unknown_dispatches.load(Ordering::Relaxed),
            connected_users: sessions.keys().map(|id| id.to_string()).collect(),
        }
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Holding;
    use crate::registry::connection::mock::MockConnection;
    use crate::valuation::ValuationSnapshot;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    fn btc_holdings() -> HoldingsSnapshot {
        HoldingsSnapshot::new(vec![Holding::new("BTC", dec!(2))])
    }

    fn tick(symbol: &str, price: rust_decimal::Decimal) -> PriceTick {
        PriceTick::new(symbol, price, Utc::now())
    }

    fn decode(frame: &bytes::Bytes) -> ValuationSnapshot {
        serde_json::from_slice(frame).unwrap()
    }

    #[tokio::test]
    async fn test_dispatch_delivers_snapshot() {
        let registry = ConnectionRegistry::new();
        let user = UserId::new();
        let (conn, log) = MockConnection::new();

        registry.register(user, btc_holdings(), Box::new(conn));
        registry.dispatch(user, &tick("BTC", dec!(50000))).unwrap();

        assert!(log.wait_for_frames(1, Duration::from_secs(1)).await);

        let snapshot = decode(&log.frames()[0]);
        assert_eq!(snapshot.user_id, user);
        let btc = &snapshot.positions["BTC"];
        assert_eq!(btc.quantity, dec!(2));
        assert_eq!(btc.price, dec!(50000));
        assert_eq!(btc.value, dec!(100000));
    }

    #[tokio::test]
    async fn test_unheld_symbol_produces_no_delivery() {
        let registry = ConnectionRegistry::new();
        let user = UserId::new();
        let (conn, log) = MockConnection::new();

        registry.register(user, btc_holdings(), Box::new(conn));
        registry.dispatch(user, &tick("BTC", dec!(50000))).unwrap();
        assert!(log.wait_for_frames(1, Duration::from_secs(1)).await);

        // ETH is not held: no new frame and no BTC retransmission
        registry.dispatch(user, &tick("ETH", dec!(3000))).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(log.frame_count(), 1);
        assert_eq!(registry.stats().total_skipped, 1);
    }

    #[tokio::test]
    async fn test_snapshot_reflects_latest_prices() {
        let registry = ConnectionRegistry::new();
        let user = UserId::new();
        let (conn, log) = MockConnection::new();
        let holdings = HoldingsSnapshot::new(vec![
            Holding::new("BTC", dec!(1)),
            Holding::new("ETH", dec!(4)),
        ]);

        registry.register(user, holdings, Box::new(conn));
        registry.dispatch(user, &tick("BTC", dec!(40000))).unwrap();
        registry.dispatch(user, &tick("ETH", dec!(3000))).unwrap();
        registry.dispatch(user, &tick("BTC", dec!(41000))).unwrap();

        assert!(log.wait_for_frames(3, Duration::from_secs(1)).await);

        // First snapshot only knows BTC; ETH price has not arrived yet
        let first = decode(&log.frames()[0]);
        assert_eq!(first.positions.len(), 1);

        let last = decode(&log.frames()[2]);
        assert_eq!(last.positions["BTC"].price, dec!(41000));
        assert_eq!(last.positions["ETH"].value, dec!(12000));
    }

    #[tokio::test]
    async fn test_dispatch_unknown_user() {
        let registry = ConnectionRegistry::new();

        let result = registry.dispatch(UserId::new(), &tick("BTC", dec!(50000)));

        assert!(matches!(result, Err(DispatchError::SessionNotFound(_))));
        assert_eq!(registry.stats().unknown_dispatches, 1);
    }

    #[tokio::test]
    async fn test_duplicate_registration_replaces_session() {
        let registry = ConnectionRegistry::new();
        let user = UserId::new();
        let (old_conn, old_log) = MockConnection::new();
        let (new_conn, new_log) = MockConnection::new();

        registry.register(user, btc_holdings(), Box::new(old_conn));
        registry.register(user, btc_holdings(), Box::new(new_conn));

        assert_eq!(registry.session_count(), 1);
        // The replaced session's writer shuts down and closes its connection
        assert!(old_log.wait_for_close(Duration::from_secs(1)).await);

        registry.dispatch(user, &tick("BTC", dec!(50000))).unwrap();
        assert!(new_log.wait_for_frames(1, Duration::from_secs(1)).await);
        assert_eq!(old_log.frame_count(), 0);
    }

    #[tokio::test]
    async fn test_unregister_stops_delivery() {
        let registry = ConnectionRegistry::new();
        let user = UserId::new();
        let (conn, log) = MockConnection::new();

        registry.register(user, btc_holdings(), Box::new(conn));
        registry.unregister(user);

        assert!(log.wait_for_close(Duration::from_secs(1)).await);
        assert_eq!(registry.session_count(), 0);

        // Ticks may keep arriving after a disconnect; none may reach the peer
        let result = registry.dispatch(user, &tick("BTC", dec!(50000)));
        assert!(matches!(result, Err(DispatchError::SessionNotFound(_))));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(log.frame_count(), 0);
    }

    #[tokio::test]
    async fn test_unregister_unknown_user_is_noop() {
        let registry = ConnectionRegistry::new();
        registry.unregister(UserId::new());
        assert_eq!(registry.session_count(), 0);
    }

    #[tokio::test]
    async fn test_full_queue_drops_instead_of_blocking() {
        let registry = ConnectionRegistry::with_queue_capacity(1);
        let user = UserId::new();
        let (conn, _log) = MockConnection::stalled();

        registry.register(user, btc_holdings(), Box::new(conn));

        // First frame parks in the stalled writer, second fills the queue
        registry.dispatch(user, &tick("BTC", dec!(1))).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        for i in 0..5 {
            registry
                .dispatch(user, &tick("BTC", dec!(2) + rust_decimal::Decimal::from(i)))
                .unwrap();
        }

        let stats = registry.stats();
        assert!(stats.total_dropped >= 1, "expected overflow drops, got {stats:?}");
        // Dispatch returned every time; the stalled client cost us nothing
    }

    #[tokio::test]
    async fn test_write_error_kills_only_that_session() {
        let registry = ConnectionRegistry::new();
        let healthy = UserId::new();
        let broken = UserId::new();
        let (healthy_conn, healthy_log) = MockConnection::new();
        let (broken_conn, broken_log) = MockConnection::failing();

        registry.register(healthy, btc_holdings(), Box::new(healthy_conn));
        registry.register(broken, btc_holdings(), Box::new(broken_conn));

        registry.dispatch(broken, &tick("BTC", dec!(50000))).unwrap();
        registry.dispatch(healthy, &tick("BTC", dec!(50000))).unwrap();

        // The failing writer closes its own connection and stops
        assert!(broken_log.wait_for_close(Duration::from_secs(1)).await);
        assert!(healthy_log.wait_for_frames(1, Duration::from_secs(1)).await);

        // Later dispatches to the dead session report it as gone
        let result = registry.dispatch(broken, &tick("BTC", dec!(51000)));
        assert!(matches!(result, Err(DispatchError::SessionNotFound(_))));
    }

    #[tokio::test]
    async fn test_stats_tracking() {
        let registry = ConnectionRegistry::new();
        let user = UserId::new();
        let (conn, log) = MockConnection::new();

        registry.register(user, btc_holdings(), Box::new(conn));
        registry.dispatch(user, &tick("BTC", dec!(50000))).unwrap();
        registry.dispatch(user, &tick("ETH", dec!(3000))).unwrap();
        let _ = registry.dispatch(UserId::new(), &tick("BTC", dec!(50000)));

        assert!(log.wait_for_frames(1, Duration::from_secs(1)).await);

        let stats = registry.stats();
        assert_eq!(stats.session_count, 1);
        assert_eq!(stats.total_dispatched, 1);
        assert_eq!(stats.total_skipped, 1);
        assert_eq!(stats.unknown_dispatches, 1);
        assert_eq!(stats.connected_users, vec![user.to_string()]);
    }
}
