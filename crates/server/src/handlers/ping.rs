//! Liveness endpoint.

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;

/// GET /v1/_ping - liveness probe.
///
/// The v1 client hits this before authenticating to discover the registry
/// version from the response headers.
pub async fn ping() -> impl IntoResponse {
    (StatusCode::OK, Json(true))
}
