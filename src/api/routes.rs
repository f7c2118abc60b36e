//! API route definitions

use super::handlers::{self, ApiState};
use super::issue_handlers;
use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the API router
pub fn create_router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(handlers::health))
        // ====================================================================
        // Feeds
        // ====================================================================
        .route("/api/dashboard", get(issue_handlers::dashboard))
        .route("/api/issues", get(issue_handlers::list_issues))
        // ====================================================================
        // Single issues and hierarchy
        // ====================================================================
        .route(
            "/api/projects/{id}/issues/{iid}",
            get(issue_handlers::get_issue),
        )
        .route(
            "/api/projects/{id}/issues/{iid}/children",
            post(issue_handlers::create_child_issue),
        )
        .route(
            "/api/projects/{id}/issues/{iid}/children/{child_iid}",
            delete(issue_handlers::unlink_child),
        )
        .route(
            "/api/projects/{id}/issues-with-children",
            post(issue_handlers::create_issue_with_children),
        )
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
