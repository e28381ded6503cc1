use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::stream::StreamExt;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::connection::WsConnection;
use crate::holdings::HoldingsProvider;
use crate::models::UserId;
use crate::registry::ConnectionRegistry;

/// WebSocket connection state
pub struct WsState {
    pub registry: Arc<ConnectionRegistry>,
    pub holdings: Arc<dyn HoldingsProvider>,
}

/// Identity of the connecting user
///
/// Authentication happens upstream (gateway/reverse proxy); by the time a
/// connection reaches this route the id is trusted.
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub user_id: UserId,
}

/// Handle WebSocket upgrade request
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<Arc<WsState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, query.user_id, state))
}

/// Drive one client connection from registration to teardown
async fn handle_socket(mut socket: WebSocket, user_id: UserId, state: Arc<WsState>) {
    let holdings = match state.holdings.lookup_holdings(user_id).await {
        Ok(holdings) => holdings,
        Err(e) => {
            warn!(user_id = %user_id, error = %e, "rejecting connection");
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    };

    info!(user_id = %user_id, positions = holdings.len(), "WebSocket client connected");

    let (sender, mut receiver) = socket.split();
    state
        .registry
        .register(user_id, holdings, Box::new(WsConnection::new(sender)));

    // The stream is one-way; inbound frames only matter as a liveness
    // signal. Detecting the disconnect here is what triggers unregister.
    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Close(_)) => break,
            Ok(Message::Text(text)) => {
                debug!(user_id = %user_id, %text, "ignoring inbound message");
            }
            Ok(_) => {}
            Err(e) => {
                debug!(user_id = %user_id, error = %e, "WebSocket read failed");
                break;
            }
        }
    }

    state.registry.unregister(user_id);
    info!(user_id = %user_id, "WebSocket client disconnected");
}
