//! OpenAPI documentation configuration.

use crate::controllers::HealthResponse;
use orders_core::{ErrorResponse, FieldError};
use utoipa::OpenApi;

/// OpenAPI documentation for the orders API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Orders Service API",
        version = "1.0.0",
        description = "Read access to cached order documents"
    ),
    paths(
        crate::controllers::order_controller::get_order,
        crate::controllers::health_controller::health_check,
        crate::controllers::health_controller::readiness_check,
        crate::controllers::health_controller::liveness_check,
    ),
    components(
        schemas(
            ErrorResponse,
            FieldError,
            HealthResponse,
        )
    ),
    tags(
        (name = "orders", description = "Order lookup"),
        (name = "health", description = "Health check endpoints")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_order_path() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/order/{order_uid}"));
        assert!(doc.paths.paths.contains_key("/health"));
    }
}
