use std::sync::Arc;

use axum::{
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Form, Json, Router,
};
use cookie::time::Duration as CookieDuration;
use cookie::Cookie;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use super::flash::{self, Flash};
use crate::domain::user::{Contact, User};
use crate::error::ApiError;
use crate::middleware::auth::CurrentUser;
use crate::security::config::SecurityConfig;
use crate::services::directory::NewUser;
use crate::state::AppState;

pub fn public_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(home_page))
        .route("/register", get(register_page).post(register))
        .route("/login", get(login_page).post(login))
}

pub fn session_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/logout", get(logout))
        .route("/profile", get(profile))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RegisterForm {
    name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    password: String,
    confirm_password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LoginForm {
    email: Option<String>,
    phone: Option<String>,
    password: String,
}

/// Landing targets of the form redirects. They carry the pending flash without consuming it.
fn page(state: &AppState, headers: &HeaderMap, name: &str) -> Json<serde_json::Value> {
    Json(json!({
        "success": true,
        "page": name,
        "flash": flash::read(&state.security, headers),
    }))
}

async fn home_page(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Json<serde_json::Value> {
    page(&state, &headers, "home")
}

async fn register_page(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Json<serde_json::Value> {
    page(&state, &headers, "register")
}

async fn login_page(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Json<serde_json::Value> {
    page(&state, &headers, "login")
}

async fn register(State(state): State<Arc<AppState>>, Form(form): Form<RegisterForm>) -> Response {
    let input = NewUser {
        name: form.name,
        email: form.email,
        phone: form.phone,
        password: form.password,
        confirm_password: form.confirm_password,
    };
    let cfg = &state.security;
    match state.directory.register(input).await {
        Ok(user) => match session_cookie(&state, &user) {
            Ok(cookie) => flash::redirect(cfg, "/", Flash::success("Registration successful!"), [cookie]),
            Err(e) => failure_redirect(cfg, "/register", e),
        },
        Err(e) => failure_redirect(cfg, "/register", e),
    }
}

async fn login(State(state): State<Arc<AppState>>, Form(form): Form<LoginForm>) -> Response {
    let cfg = &state.security;
    let Some(contact) = Contact::from_parts(form.email.as_deref(), form.phone.as_deref()) else {
        return failure_redirect(cfg, "/login", ApiError::InvalidCredentials);
    };
    let user = match state.directory.authenticate(&contact, &form.password).await {
        Ok(user) => user,
        Err(e) => return failure_redirect(cfg, "/login", e),
    };
    match session_cookie(&state, &user) {
        Ok(cookie) => {
            info!(user_id = %user.id, "login");
            flash::redirect(cfg, "/", Flash::success("Login successful!"), [cookie])
        }
        Err(e) => failure_redirect(cfg, "/login", e),
    }
}

async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Response {
    info!(user_id = %user.id, "logout");
    let cfg = &state.security;
    flash::redirect(
        cfg,
        "/",
        Flash::info("You have been logged out."),
        [clear_session_cookie(cfg)],
    )
}

async fn profile(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let bookings: Vec<_> = state
        .bookings
        .list_user_bookings(user.id)
        .await?
        .iter()
        .map(|b| b.profile_entry())
        .collect();
    Ok(Json(json!({
        "success": true,
        "user": user.view(),
        "bookings": bookings,
    })))
}

fn session_cookie(state: &AppState, user: &User) -> Result<String, ApiError> {
    let token = state
        .jwt
        .issue_session(user.id, &user.name)
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    let cfg = &state.security;
    Ok(Cookie::build((cfg.session_cookie_name.clone(), token))
        .http_only(true)
        .secure(cfg.secure_cookies)
        .same_site(cfg.same_site)
        .max_age(CookieDuration::minutes(cfg.session_ttl_minutes))
        .path("/")
        .build()
        .to_string())
}

fn clear_session_cookie(cfg: &SecurityConfig) -> String {
    Cookie::build((cfg.session_cookie_name.clone(), ""))
        .http_only(true)
        .secure(cfg.secure_cookies)
        .same_site(cfg.same_site)
        .max_age(CookieDuration::seconds(0))
        .path("/")
        .build()
        .to_string()
}

fn failure_redirect(cfg: &SecurityConfig, to: &str, err: ApiError) -> Response {
    match &err {
        ApiError::StoreUnavailable(_) | ApiError::Internal(_) => warn!("{to} failed: {err}"),
        _ => {}
    }
    flash::redirect(cfg, to, Flash::error(err.public_message()), [])
}
