use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::domain::user::ContactKind;
use crate::infra::store::StoreError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0} already registered!")]
    DuplicateContact(ContactKind),

    #[error("Invalid credentials!")]
    InvalidCredentials,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Login required")]
    Unauthenticated,

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("Booking is already cancelled")]
    AlreadyCancelled,

    #[error("Payment already recorded for this booking")]
    PaymentAlreadyRecorded,

    #[error("{0}")]
    Validation(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::DuplicateContact(_) => StatusCode::CONFLICT,
            ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::Unauthorized(_) => StatusCode::FORBIDDEN,
            ApiError::AlreadyCancelled => StatusCode::CONFLICT,
            ApiError::PaymentAlreadyRecorded => StatusCode::CONFLICT,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::StoreUnavailable(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Text safe to show a caller. Store and internal failures are never echoed back.
    pub fn public_message(&self) -> String {
        match self {
            ApiError::StoreUnavailable(_) | ApiError::Internal(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::StoreUnavailable(e) => tracing::error!("store failure: {e}"),
            ApiError::Internal(e) => tracing::error!("internal failure: {e}"),
            _ => {}
        }
        let body = Json(json!({
            "success": false,
            "message": self.public_message(),
        }));
        (self.status(), body).into_response()
    }
}
