use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Form, Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use super::flash::{self, Flash};
use crate::domain::booking::{BookingIdPrefix, RawBooking, DEFAULT_SLOT_PRICE, TIME_SLOTS};
use crate::domain::payment::PaymentDetails;
use crate::error::ApiError;
use crate::middleware::auth::CurrentUser;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/plugwise_me", get(station_page))
        .route("/payment", get(payment_page))
        .route("/confirmation", post(confirmation))
        .route("/generate_ticket", post(generate_ticket))
        .route("/cancel_booking/{booking_id}", post(cancel_booking))
}

/// Booking fields as posted by the payment and ticket forms.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct BookingForm {
    date: Option<String>,
    #[serde(alias = "selectedTimeSlot")]
    time_slot: Option<String>,
    #[serde(alias = "selectedStation")]
    station_name: Option<String>,
    station_id: Option<String>,
    charger_type: Option<String>,
    plug_type: Option<String>,
    vehicle_type: Option<String>,
    vehicle_brand: Option<String>,
    vehicle_model: Option<String>,
    vehicle_number: Option<String>,
    amount: Option<String>,
    payment_method: Option<String>,
    card_number: Option<String>,
    upi_id: Option<String>,
    bank_name: Option<String>,
}

impl BookingForm {
    fn raw(&self) -> Result<RawBooking, ApiError> {
        let amount = match self.amount.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(v) => Some(v.parse::<i64>().map_err(|_| {
                ApiError::Validation(format!("amount `{v}` is not a whole number"))
            })?),
        };
        Ok(RawBooking {
            station_id: self.station_id.clone(),
            station_name: self.station_name.clone(),
            date: self.date.clone(),
            time_slot: self.time_slot.clone(),
            charger_type: self.charger_type.clone(),
            plug_type: self.plug_type.clone(),
            vehicle_type: self.vehicle_type.clone(),
            vehicle_brand: self.vehicle_brand.clone(),
            vehicle_model: self.vehicle_model.clone(),
            vehicle_number: self.vehicle_number.clone(),
            amount,
            payment_method: self.payment_method.clone(),
        })
    }
}

/// Station picked on the map, as passed along in the query string.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StationQuery {
    station_id: Option<String>,
    name: Option<String>,
    address: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    power: Option<String>,
    price: Option<String>,
}

/// Booking page. Echoes the selected station, if any, so the form can prefill it.
async fn station_page(
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Query(station): Query<StationQuery>,
) -> Json<serde_json::Value> {
    let station_info = station.station_id.map(|id| {
        json!({
            "id": id,
            "name": station.name,
            "address": station.address,
            "type": station.kind,
            "power": station.power,
            "price": station.price,
        })
    });
    Json(json!({
        "success": true,
        "user_name": user.name,
        "station_info": station_info,
        "time_slots": TIME_SLOTS,
    }))
}

/// Prefill for the payment page, echoing the slot the user picked on the map.
async fn payment_page(
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Query(form): Query<BookingForm>,
) -> Json<serde_json::Value> {
    Json(json!({
        "success": true,
        "booking": {
            "station_name": form.station_name,
            "station_id": form.station_id,
            "time_slot": form.time_slot,
            "charger_type": form.charger_type,
            "plug_type": form.plug_type,
            "vehicle_type": form.vehicle_type,
            "vehicle_brand": form.vehicle_brand,
            "vehicle_model": form.vehicle_model,
            "vehicle_number": form.vehicle_number,
            "date": form.date,
            "user_name": user.name,
            "amount": DEFAULT_SLOT_PRICE,
        },
        "time_slots": TIME_SLOTS,
    }))
}

async fn confirmation(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Form(form): Form<BookingForm>,
) -> Result<impl IntoResponse, ApiError> {
    let draft = form.raw()?.into_draft()?;
    let booking = match draft.payment_method {
        Some(method) => {
            let details = PaymentDetails::from_fields(
                method,
                form.card_number.as_deref(),
                form.upi_id.as_deref(),
                form.bank_name.as_deref(),
            )?;
            let (booking, _) = state
                .bookings
                .place_booking(&user, draft, BookingIdPrefix::Confirmation, details)
                .await?;
            booking
        }
        None => {
            state
                .bookings
                .create_booking(&user, draft, BookingIdPrefix::Confirmation)
                .await?
        }
    };
    Ok(Json(json!({ "success": true, "booking": booking })))
}

async fn generate_ticket(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Form(form): Form<BookingForm>,
) -> Response {
    let cfg = &state.security;
    let result = match form.raw().and_then(RawBooking::into_draft) {
        Ok(draft) => {
            state
                .bookings
                .create_booking(&user, draft, BookingIdPrefix::Ticket)
                .await
        }
        Err(e) => Err(e),
    };
    match result {
        Ok(_) => flash::redirect(
            cfg,
            "/profile",
            Flash::success("Booking successful! Your ticket has been generated."),
            [],
        ),
        Err(e) => {
            warn!(user_id = %user.id, "ticket generation failed: {e}");
            flash::redirect(
                cfg,
                "/plugwise_me",
                Flash::error("Could not generate your ticket. Please check the details and try again."),
                [],
            )
        }
    }
}

async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(booking_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.bookings.cancel_booking(&booking_id, user.id).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Booking cancelled successfully",
    })))
}
