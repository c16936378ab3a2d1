use std::sync::Arc;

use axum::{middleware::from_fn_with_state, routing::get, Router};

use crate::middleware::auth::{require_api_session, require_session};
use crate::state::AppState;

mod account;
mod api;
pub mod flash;
mod tickets;

pub fn router(state: Arc<AppState>) -> Router {
    let session = Router::new()
        .merge(account::session_router())
        .merge(tickets::router())
        .route_layer(from_fn_with_state(state.clone(), require_session));

    let api = api::router().route_layer(from_fn_with_state(state.clone(), require_api_session));

    Router::new()
        .merge(account::public_router())
        .merge(flash::router())
        .merge(session)
        .nest("/api", api)
        .route("/health", get(|| async { "OK" }))
        .with_state(state)
}
