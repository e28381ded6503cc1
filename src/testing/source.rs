use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::bridge::{SourceError, TickSource};

/// In-process tick source backed by a bounded channel
///
/// Stands in for the message bus in tests and in the sim feed binary: the
/// sender half plays the publisher, the source half plugs into the bridge.
pub struct ChannelTickSource {
    rx: mpsc::Receiver<Bytes>,
}

impl ChannelTickSource {
    pub fn new(capacity: usize) -> (mpsc::Sender<Bytes>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self { rx })
    }
}

#[async_trait]
impl TickSource for ChannelTickSource {
    async fn receive_next(&mut self) -> Result<Bytes, SourceError> {
        self.rx.recv().await.ok_or(SourceError::Closed)
    }
}
