use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Errors surfaced by a client connection handle
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The underlying transport rejected the write (peer gone, socket closed)
    #[error("transport write failed: {0}")]
    Transport(String),

    /// The frame could not be converted to the transport's text encoding
    #[error("frame is not valid UTF-8: {0}")]
    Encoding(String),
}

/// Full-duplex connection handle supplied by the transport-upgrade layer
///
/// The writer task takes exclusive ownership of the handle at registration,
/// so implementations never need internal synchronization. A write error is
/// terminal for the connection.
#[async_trait]
pub trait ClientConnection: Send + 'static {
    /// Deliver one serialized frame to the peer
    async fn write_frame(&mut self, frame: Bytes) -> Result<(), ConnectionError>;

    /// Release the underlying transport; must be idempotent
    async fn close(&mut self);
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Shared view into everything a MockConnection has seen
    #[derive(Clone, Default)]
    pub struct ConnectionLog {
        frames: Arc<Mutex<Vec<Bytes>>>,
        closed: Arc<AtomicBool>,
    }

    impl ConnectionLog {
        pub fn frames(&self) -> Vec<Bytes> {
            self.frames.lock().clone()
        }

        pub fn frame_count(&self) -> usize {
            self.frames.lock().len()
        }

        pub fn is_closed(&self) -> bool {
            self.closed.load(Ordering::Acquire)
        }

        /// Poll until at least `n` frames arrived or the timeout elapses
        pub async fn wait_for_frames(&self, n: usize, timeout: Duration) -> bool {
            let deadline = tokio::time::Instant::now() + timeout;
            while tokio::time::Instant::now() < deadline {
                if self.frame_count() >= n {
                    return true;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            self.frame_count() >= n
        }

        pub async fn wait_for_close(&self, timeout: Duration) -> bool {
            let deadline = tokio::time::Instant::now() + timeout;
            while tokio::time::Instant::now() < deadline {
                if self.is_closed() {
                    return true;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            self.is_closed()
        }
    }

    enum WriteBehavior {
        Record,
        Fail,
        Stall,
    }

    /// In-memory ClientConnection for registry and bridge tests
    pub struct MockConnection {
        log: ConnectionLog,
        behavior: WriteBehavior,
    }

    impl MockConnection {
        pub fn new() -> (Self, ConnectionLog) {
            let log = ConnectionLog::default();
            (
                Self {
                    log: log.clone(),
                    behavior: WriteBehavior::Record,
                },
                log,
            )
        }

        /// Connection whose writes always error, as a dead peer would
        pub fn failing() -> (Self, ConnectionLog) {
            let log = ConnectionLog::default();
            (
                Self {
                    log: log.clone(),
                    behavior: WriteBehavior::Fail,
                },
                log,
            )
        }

        /// Connection whose writes never complete, to back up the queue
        pub fn stalled() -> (Self, ConnectionLog) {
            let log = ConnectionLog::default();
            (
                Self {
                    log: log.clone(),
                    behavior: WriteBehavior::Stall,
                },
                log,
            )
        }
    }

    #[async_trait]
    impl ClientConnection for MockConnection {
        async fn write_frame(&mut self, frame: Bytes) -> Result<(), ConnectionError> {
            match self.behavior {
                WriteBehavior::Record => {
                    self.log.frames.lock().push(frame);
                    Ok(())
                }
                WriteBehavior::Fail => Err(ConnectionError::Transport("peer gone".into())),
                WriteBehavior::Stall => {
                    futures::future::pending::<()>().await;
                    unreachable!()
                }
            }
        }

        async fn close(&mut self) {
            self.log.closed.store(true, Ordering::Release);
        }
    }
}
