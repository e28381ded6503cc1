use utoipa::OpenApi;

use crate::api::handlers;
use crate::api::responses::*;
use crate::bridge::BridgeStats;
use crate::registry::RegistryStats;

/// OpenAPI specification
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Portfolio Stream API",
        version = "1.0.0",
        description = "Real-time portfolio valuation fan-out over WebSocket"
    ),
    paths(
        handlers::health_check,
        handlers::get_registry_stats,
        handlers::get_bridge_stats,
        handlers::inject_tick,
    ),
    components(
        schemas(
            HealthResponse,
            RegistryStats,
            BridgeStats,
            InjectTickRequest,
            InjectTickResponse,
            ErrorResponse,
        )
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Sessions", description = "Connection registry monitoring"),
        (name = "Bridge", description = "Ingestion bridge monitoring"),
        (name = "Ticks", description = "Manual tick dispatch"),
    )
)]
pub struct ApiDoc;
