use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::bridge::BridgeCounters;
use crate::holdings::HoldingsProvider;
use crate::registry::ConnectionRegistry;
use crate::websocket::{websocket_handler, WsState};

use super::handlers::{self, ApiState};
use super::openapi::ApiDoc;

/// Create the API router with Swagger UI and WebSocket support
pub fn create_router(
    registry: Arc<ConnectionRegistry>,
    holdings: Arc<dyn HoldingsProvider>,
    bridge: Option<BridgeCounters>,
) -> Router {
    let ws_state = Arc::new(WsState {
        registry: registry.clone(),
        holdings,
    });

    let api_state = ApiState { registry, bridge };

    Router::new()
        .merge(
            SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()),
        )
        // WebSocket endpoint
        .route("/ws", get(websocket_handler))
        .with_state(ws_state)
        // Monitoring and manual dispatch
        .route("/api/v1/health", get(handlers::health_check))
        .route("/api/v1/sessions", get(handlers::get_registry_stats))
        .route("/api/v1/bridge/stats", get(handlers::get_bridge_stats))
        .route("/api/v1/ticks", post(handlers::inject_tick))
        .with_state(api_state)
}
