use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use std::sync::Arc;

use crate::bridge::{BridgeCounters, BridgeStats};
use crate::models::PriceTick;
use crate::registry::{ConnectionRegistry, DispatchError, RegistryStats};

use super::responses::*;

/// Shared state for the REST endpoints
#[derive(Clone)]
pub struct ApiState {
    pub registry: Arc<ConnectionRegistry>,
    /// Present only when a tick feed is attached
    pub bridge: Option<BridgeCounters>,
}

/// Convert DispatchError to HTTP response
impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            DispatchError::SessionNotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            DispatchError::Serialize(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
        };

        let body = Json(ErrorResponse {
            error: status.to_string(),
            message: error_message,
        });

        (status, body).into_response()
    }
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<ApiState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        session_count: state.registry.session_count(),
        timestamp: Utc::now(),
    })
}

/// Connection registry statistics
#[utoipa::path(
    get,
    path = "/api/v1/sessions",
    tag = "Sessions",
    responses(
        (status = 200, description = "Current registry statistics", body = RegistryStats)
    )
)]
pub async fn get_registry_stats(State(state): State<ApiState>) -> Json<RegistryStats> {
    Json(state.registry.stats())
}

/// Ingestion bridge statistics
#[utoipa::path(
    get,
    path = "/api/v1/bridge/stats",
    tag = "Bridge",
    responses(
        (status = 200, description = "Current bridge statistics", body = BridgeStats),
        (status = 404, description = "No tick feed attached", body = ErrorResponse)
    )
)]
pub async fn get_bridge_stats(
    State(state): State<ApiState>,
) -> Result<Json<BridgeStats>, (StatusCode, Json<ErrorResponse>)> {
    match &state.bridge {
        Some(counters) => Ok(Json(counters.snapshot())),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: StatusCode::NOT_FOUND.to_string(),
                message: "no tick feed attached".to_string(),
            }),
        )),
    }
}

/// Dispatch a tick directly, bypassing the message bus
///
/// Exists for exercising the fan-out path without a broker; the bridge
/// uses the same registry entry point.
#[utoipa::path(
    post,
    path = "/api/v1/ticks",
    tag = "Ticks",
    request_body = InjectTickRequest,
    responses(
        (status = 202, description = "Tick dispatched", body = InjectTickResponse),
        (status = 404, description = "No session for this user", body = ErrorResponse)
    )
)]
pub async fn inject_tick(
    State(state): State<ApiState>,
    Json(request): Json<InjectTickRequest>,
) -> Result<(StatusCode, Json<InjectTickResponse>), DispatchError> {
    let tick = PriceTick::new(
        request.symbol.clone(),
        request.price,
        request.event_time.unwrap_or_else(Utc::now),
    );

    state.registry.dispatch(request.user_id, &tick)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(InjectTickResponse {
            user_id: request.user_id,
            symbol: request.symbol,
            dispatched_at: Utc::now(),
        }),
    ))
}
