use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use cookie::Cookie;
use tracing::debug;

use crate::domain::user::User;
use crate::error::ApiError;
use crate::state::AppState;

/// The signed-in user, inserted into request extensions by the session gate.
#[derive(Clone, Debug)]
pub struct CurrentUser(pub User);

/// Gate for the form routes: no session sends the browser to `/login`.
pub async fn require_session(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    match resolve_user(&state, req.headers()).await {
        Ok(user) => {
            req.extensions_mut().insert(CurrentUser(user));
            next.run(req).await
        }
        Err(ApiError::Unauthenticated) => Redirect::to("/login").into_response(),
        Err(e) => e.into_response(),
    }
}

/// Gate for `/api`: no session is a JSON 401.
pub async fn require_api_session(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = resolve_user(&state, req.headers()).await?;
    req.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(req).await)
}

async fn resolve_user(state: &AppState, headers: &HeaderMap) -> Result<User, ApiError> {
    let token = bearer_from_header(headers)
        .or_else(|| cookie_value(headers, &state.security.session_cookie_name))
        .ok_or(ApiError::Unauthenticated)?;

    let claims = state.jwt.verify(&token).map_err(|e| {
        debug!("rejected session token: {e}");
        ApiError::Unauthenticated
    })?;
    let user_id = claims.user_id().ok_or(ApiError::Unauthenticated)?;

    match state.directory.find_by_id(user_id).await {
        Ok(user) => Ok(user),
        Err(ApiError::NotFound(_)) => Err(ApiError::Unauthenticated),
        Err(e) => Err(e),
    }
}

fn bearer_from_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Value of the named request cookie, percent-decoded.
pub(crate) fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    for value in headers.get_all(header::COOKIE) {
        let Ok(raw) = value.to_str() else { continue };
        for part in raw.split(';') {
            if let Ok(parsed) = Cookie::parse_encoded(part.trim()) {
                if parsed.name() == name && !parsed.value().is_empty() {
                    return Some(parsed.value().to_string());
                }
            }
        }
    }
    None
}
