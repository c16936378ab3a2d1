use std::sync::Arc;

use axum::{
    extract::State,
    http::{header::SET_COOKIE, HeaderMap},
    response::{AppendHeaders, IntoResponse, Redirect, Response},
    routing::get,
    Json, Router,
};
use cookie::time::Duration as CookieDuration;
use cookie::Cookie;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::middleware::auth::cookie_value;
use crate::security::config::SecurityConfig;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashCategory {
    Success,
    Error,
    Info,
}

/// One-shot message shown on the next page the browser loads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub category: FlashCategory,
    pub message: String,
}

impl Flash {
    pub fn success(message: impl Into<String>) -> Self {
        Self { category: FlashCategory::Success, message: message.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { category: FlashCategory::Error, message: message.into() }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self { category: FlashCategory::Info, message: message.into() }
    }
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/flash", get(take_flash))
}

/// `Set-Cookie` value carrying `flash`.
pub fn set_cookie(cfg: &SecurityConfig, flash: &Flash) -> String {
    let value = serde_json::to_string(flash).unwrap_or_default();
    Cookie::build((cfg.flash_cookie_name.clone(), value))
        .http_only(true)
        .secure(cfg.secure_cookies)
        .same_site(cfg.same_site)
        .max_age(CookieDuration::minutes(5))
        .path("/")
        .build()
        .encoded()
        .to_string()
}

pub fn clear_cookie(cfg: &SecurityConfig) -> String {
    Cookie::build((cfg.flash_cookie_name.clone(), ""))
        .http_only(true)
        .secure(cfg.secure_cookies)
        .same_site(cfg.same_site)
        .max_age(CookieDuration::seconds(0))
        .path("/")
        .build()
        .to_string()
}

pub fn read(cfg: &SecurityConfig, headers: &HeaderMap) -> Option<Flash> {
    let raw = cookie_value(headers, &cfg.flash_cookie_name)?;
    serde_json::from_str(&raw).ok()
}

/// 303 to `to` with a flash attached, plus any extra cookies.
pub fn redirect(
    cfg: &SecurityConfig,
    to: &str,
    flash: Flash,
    extra_cookies: impl IntoIterator<Item = String>,
) -> Response {
    let mut cookies: Vec<(_, String)> = extra_cookies
        .into_iter()
        .map(|c| (SET_COOKIE, c))
        .collect();
    cookies.push((SET_COOKIE, set_cookie(cfg, &flash)));
    (AppendHeaders(cookies), Redirect::to(to)).into_response()
}

async fn take_flash(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let flash = read(&state.security, &headers);
    (
        AppendHeaders([(SET_COOKIE, clear_cookie(&state.security))]),
        Json(json!({ "flash": flash })),
    )
        .into_response()
}
