//! Main application router.

use crate::{
    controllers::{health_controller, metrics_controller, order_controller},
    middleware::logging_middleware,
    openapi::ApiDoc,
    state::AppState,
};
use axum::{middleware, routing::get, Router};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Creates the main application router.
///
/// `metrics_path` is where the Prometheus text output is served; it answers
/// 404 when the state carries no recorder handle.
pub fn create_router(state: AppState, metrics_path: &str) -> Router {
    let router = Router::new()
        // Order lookup
        .merge(order_controller::router())
        // Health endpoints
        .merge(health_controller::router())
        // Prometheus scrape endpoint
        .merge(metrics_controller::router(metrics_path))
        // Swagger UI and OpenAPI document
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Root endpoint
        .route("/", get(root))
        .with_state(state)
        // Add middleware layers
        .layer(middleware::from_fn(logging_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid));

    info!("Router created with order endpoint and Swagger UI at /swagger-ui");
    router
}

/// Root endpoint handler.
async fn root() -> &'static str {
    "Orders Service API"
}
