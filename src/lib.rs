pub mod config;
pub mod domain;
pub mod error;
pub mod infra;
pub mod middleware;
pub mod routes;
pub mod security;
pub mod services;
pub mod state;

use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use state::AppState;

/// The full HTTP application: both surfaces, health check and request tracing.
pub fn build_app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    routes::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
