//! Order lookup controller.

use crate::{responses::AppError, state::AppState};
use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use orders_core::OrdersError;
use orders_resilience::with_timeout;
use tracing::debug;

/// Creates the order router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/order/:order_uid", get(get_order))
        .route("/order", get(missing_order_uid))
        .route("/order/", get(missing_order_uid))
}

/// Get an order by its uid.
///
/// The uid is used as given, surrounding whitespace included. The body is
/// the stored document exactly as it was ingested.
#[utoipa::path(
    get,
    path = "/order/{order_uid}",
    tag = "orders",
    params(
        ("order_uid" = String, Path, description = "Order uid")
    ),
    responses(
        (status = 200, description = "Stored order document"),
        (status = 400, description = "Empty order uid", body = orders_core::ErrorResponse),
        (status = 404, description = "Order not found", body = orders_core::ErrorResponse),
        (status = 500, description = "Backend failure", body = orders_core::ErrorResponse),
        (status = 503, description = "Lookup timed out", body = orders_core::ErrorResponse)
    )
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_uid): Path<String>,
) -> Result<Response, AppError> {
    let key = order_uid.as_str();
    if key.is_empty() {
        return Err(OrdersError::validation("order_uid must not be empty").into());
    }

    debug!(order_uid = key, "Get order request");

    let cache = &state.cache;
    let payload = with_timeout(state.request_timeout, || cache.get(key)).await?;

    Ok(([(header::CONTENT_TYPE, "application/json")], payload).into_response())
}

async fn missing_order_uid() -> AppError {
    AppError(OrdersError::validation("order_uid must not be empty"))
}
