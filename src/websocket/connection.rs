use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use bytes::Bytes;
use futures::sink::SinkExt;
use futures::stream::SplitSink;

use crate::registry::{ClientConnection, ConnectionError};

/// WebSocket write half as a registry connection handle
///
/// Snapshots are JSON, so frames go out as text messages. The read half
/// stays with the acceptance layer, which watches it for disconnect.
pub struct WsConnection {
    sink: SplitSink<WebSocket, Message>,
}

impl WsConnection {
    pub fn new(sink: SplitSink<WebSocket, Message>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl ClientConnection for WsConnection {
    async fn write_frame(&mut self, frame: Bytes) -> Result<(), ConnectionError> {
        let text = String::from_utf8(frame.to_vec())
            .map_err(|e| ConnectionError::Encoding(e.to_string()))?;

        self.sink
            .send(Message::Text(text))
            .await
            .map_err(|e| ConnectionError::Transport(e.to_string()))
    }

    async fn close(&mut self) {
        let _ = self.sink.send(Message::Close(None)).await;
        let _ = self.sink.close().await;
    }
}
