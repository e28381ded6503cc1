use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::UserId;

/// Request to inject a tick without a live message bus
#[derive(Debug, Deserialize, ToSchema)]
pub struct InjectTickRequest {
    #[schema(value_type = String, example = "7f6cdafa-1c3f-4f9d-9f53-1df618d0b0a8")]
    pub user_id: UserId,
    #[schema(example = "BTC")]
    pub symbol: String,
    #[schema(value_type = String, example = "50000.25")]
    pub price: Decimal,
    /// Defaults to the server clock when omitted
    pub event_time: Option<DateTime<Utc>>,
}

/// Response after a tick was accepted for dispatch
#[derive(Debug, Serialize, ToSchema)]
pub struct InjectTickResponse {
    #[schema(value_type = String)]
    pub user_id: UserId,
    pub symbol: String,
    pub dispatched_at: DateTime<Utc>,
}

/// Health check response
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub session_count: usize,
    pub timestamp: DateTime<Utc>,
}

/// Error response
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
