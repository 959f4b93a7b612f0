//! Route configuration.

use crate::auth::auth_middleware;
use crate::handlers;
use crate::headers::registry_headers_middleware;
use crate::state::AppState;
use axum::Router;
use axum::middleware;
use axum::routing::{get, put};
use tower_http::trace::TraceLayer;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let router = Router::new()
        // Liveness probe (intentionally unauthenticated; the client pings
        // before it has credentials)
        .route("/v1/_ping", get(handlers::ping))
        // Push control plane
        .route(
            "/v1/repositories/{namespace}/{repository}",
            put(handlers::put_repository),
        )
        .route(
            "/v1/repositories/{namespace}/{repository}/tags/{tag}",
            put(handlers::put_tag),
        )
        .route(
            "/v1/repositories/{namespace}/{repository}/tags",
            get(handlers::get_repository_tags),
        )
        .route(
            "/v1/repositories/{namespace}/{repository}/images",
            put(handlers::put_repository_images).get(handlers::get_repository_images),
        )
        // Per-image payloads
        .route(
            "/v1/images/{image_id}/json",
            put(handlers::put_image_json).get(handlers::get_image_json),
        )
        .route(
            "/v1/images/{image_id}/layer",
            put(handlers::put_image_layer).get(handlers::get_image_layer),
        )
        .route(
            "/v1/images/{image_id}/checksum",
            put(handlers::put_image_checksum),
        )
        .route(
            "/v1/images/{image_id}/ancestry",
            get(handlers::get_image_ancestry),
        );

    // Middleware layers are applied in reverse order (outermost first).
    // Order of execution: TraceLayer -> registry headers -> Auth -> Handler
    router
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            registry_headers_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
