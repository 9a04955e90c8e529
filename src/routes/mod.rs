use crate::handlers;
use crate::middleware::auth::auth_middleware;
use axum::{middleware, routing, Router};

pub fn create_routes() -> Router {
    Router::new().nest("/api/v1", api_routes())
}

fn api_routes() -> Router {
    public_read_routes().merge(protected_routes().layer(middleware::from_fn(auth_middleware)))
}

/// Read paths: consumed by dashboard widgets and the panel detail view.
fn public_read_routes() -> Router {
    Router::new()
        .route(
            "/feedback/trending",
            routing::get(handlers::feedback::trending_feedback),
        )
        .route(
            "/feedback/duplicates",
            routing::get(handlers::feedback::find_duplicates),
        )
        .route(
            "/feedback/{id}/votes",
            routing::get(handlers::vote::vote_stats),
        )
        .route(
            "/panels/{id}/health",
            routing::get(handlers::panel::panel_health),
        )
}

/// Paths that act on behalf of a caller; the gateway identity header
/// is required here.
fn protected_routes() -> Router {
    Router::new()
        .route(
            "/feedback/{id}/vote",
            routing::post(handlers::vote::cast_vote).delete(handlers::vote::retract_vote),
        )
        .route(
            "/feedback/{id}/votes/refresh",
            routing::post(handlers::vote::refresh_decayed_weights),
        )
}
