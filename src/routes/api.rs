use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::domain::booking::{BookingIdPrefix, RawBooking};
use crate::domain::payment::{PaymentDetails, PaymentMethod};
use crate::error::ApiError;
use crate::middleware::auth::CurrentUser;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/bookings", post(create_booking))
        .route("/bookings/user/{user_id}", get(user_bookings))
        .route("/bookings/{booking_id}", get(get_booking))
        .route(
            "/bookings/{booking_id}/payment",
            post(record_payment).get(get_payment),
        )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BookingPayload {
    user_id: Option<Uuid>,
    station_id: Option<String>,
    #[serde(alias = "selectedStation")]
    station_name: Option<String>,
    date: Option<String>,
    #[serde(alias = "selectedTimeSlot")]
    time_slot: Option<String>,
    charger_type: Option<String>,
    plug_type: Option<String>,
    vehicle_type: Option<String>,
    vehicle_brand: Option<String>,
    vehicle_model: Option<String>,
    vehicle_number: Option<String>,
    #[serde(alias = "amount")]
    total_amount: Option<i64>,
    payment_method: Option<String>,
    card_number: Option<String>,
    upi_id: Option<String>,
    bank_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaymentPayload {
    payment_method: String,
    amount: Option<i64>,
    card_number: Option<String>,
    upi_id: Option<String>,
    bank_name: Option<String>,
}

async fn create_booking(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    payload: Result<Json<BookingPayload>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload?;
    if payload.user_id.is_some_and(|id| id != user.id) {
        return Err(ApiError::Unauthorized("Cannot book on behalf of another user"));
    }
    let draft = RawBooking {
        station_id: payload.station_id,
        station_name: payload.station_name,
        date: payload.date,
        time_slot: payload.time_slot,
        charger_type: payload.charger_type,
        plug_type: payload.plug_type,
        vehicle_type: payload.vehicle_type,
        vehicle_brand: payload.vehicle_brand,
        vehicle_model: payload.vehicle_model,
        vehicle_number: payload.vehicle_number,
        amount: payload.total_amount,
        payment_method: payload.payment_method,
    }
    .into_draft()?;
    let method = draft
        .payment_method
        .ok_or_else(|| ApiError::Validation("paymentMethod is required".into()))?;
    let details = PaymentDetails::from_fields(
        method,
        payload.card_number.as_deref(),
        payload.upi_id.as_deref(),
        payload.bank_name.as_deref(),
    )?;

    let (booking, _) = state
        .bookings
        .place_booking(&user, draft, BookingIdPrefix::Ticket, details)
        .await?;
    Ok(Json(json!({
        "success": true,
        "booking_id": booking.booking_id,
        "message": "Booking and payment information stored successfully",
    })))
}

async fn user_bookings(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if Uuid::parse_str(&user_id).ok() != Some(user.id) {
        return Err(ApiError::Unauthorized("Cannot read another user's bookings"));
    }
    let bookings = state.bookings.list_user_bookings(user.id).await?;
    Ok(Json(json!({ "success": true, "bookings": bookings })))
}

async fn get_booking(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(booking_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let booking = state.bookings.get_owned_booking(&booking_id, user.id).await?;
    Ok(Json(json!({ "success": true, "booking": booking })))
}

async fn record_payment(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(booking_id): Path<String>,
    payload: Result<Json<PaymentPayload>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload?;
    let method = payload
        .payment_method
        .parse::<PaymentMethod>()
        .map_err(ApiError::Validation)?;
    let details = PaymentDetails::from_fields(
        method,
        payload.card_number.as_deref(),
        payload.upi_id.as_deref(),
        payload.bank_name.as_deref(),
    )?;
    let amount = match payload.amount {
        Some(amount) => amount,
        None => state.bookings.get_owned_booking(&booking_id, user.id).await?.amount,
    };

    let payment = state
        .payments
        .record_payment(&booking_id, user.id, method, amount, details)
        .await?;
    Ok(Json(json!({ "success": true, "payment": payment })))
}

async fn get_payment(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(booking_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let payment = state.payments.get_payment(&booking_id, user.id).await?;
    Ok(Json(json!({ "success": true, "payment": payment })))
}
