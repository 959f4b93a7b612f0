//! Registry identification headers.
//!
//! Every response carries the registry version/config/encrypt headers; v1
//! clients read them to pick protocol behavior before looking at the body.

use crate::state::AppState;
use axum::extract::{Request, State};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;

pub const REGISTRY_VERSION: &str = "x-docker-registry-version";
pub const REGISTRY_CONFIG: &str = "x-docker-registry-config";
pub const REGISTRY_ENCRYPT: &str = "x-docker-encrypt";
pub const TOKEN_HEADER: &str = "x-docker-token";
pub const ENDPOINTS_HEADER: &str = "x-docker-endpoints";

/// Middleware stamping the registry identification headers on every
/// response, error responses included.
pub async fn registry_headers_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    if let Ok(value) = HeaderValue::from_str(&state.config.registry.version) {
        headers.insert(REGISTRY_VERSION, value);
    }
    if let Ok(value) = HeaderValue::from_str(&state.config.registry.config) {
        headers.insert(REGISTRY_CONFIG, value);
    }
    let encrypt = if state.config.registry.encrypt {
        "true"
    } else {
        "false"
    };
    headers.insert(REGISTRY_ENCRYPT, HeaderValue::from_static(encrypt));

    response
}
