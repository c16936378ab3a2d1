use rand::Rng;
use serde::{Deserialize, Serialize};
use time::macros::format_description;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use super::payment::PaymentMethod;
use crate::error::ApiError;

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

/// Slot labels offered by the payment page.
pub const TIME_SLOTS: [&str; 12] = [
    "9:00 AM", "10:00 AM", "11:00 AM", "2:00 PM", "3:00 PM", "4:00 PM", "5:00 PM", "6:00 PM",
    "7:00 PM", "8:00 PM", "9:00 PM", "10:00 PM",
];

/// Price charged when a ticket form carries no amount.
pub const DEFAULT_SLOT_PRICE: i64 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingStatus {
    #[serde(rename = "Active", alias = "active", alias = "confirmed")]
    Active,
    #[serde(rename = "cancelled")]
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Active => "Active",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" | "confirmed" => Ok(BookingStatus::Active),
            "cancelled" => Ok(BookingStatus::Cancelled),
            other => Err(format!("unknown booking status `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingIdPrefix {
    /// Tickets and JSON API bookings.
    Ticket,
    /// Bookings made from the payment confirmation form.
    Confirmation,
}

impl BookingIdPrefix {
    pub fn as_str(self) -> &'static str {
        match self {
            BookingIdPrefix::Ticket => "PLG",
            BookingIdPrefix::Confirmation => "BK",
        }
    }
}

/// `<prefix><YYYYMMDDHHMMSS><6 random digits>`, all digits after the prefix.
pub fn generate_booking_id(prefix: BookingIdPrefix, now: OffsetDateTime) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!(
        "{}{:04}{:02}{:02}{:02}{:02}{:02}{:06}",
        prefix.as_str(),
        now.year(),
        u8::from(now.month()),
        now.day(),
        now.hour(),
        now.minute(),
        now.second(),
        suffix
    )
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationDetails {
    pub station_id: Option<String>,
    pub station_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotDetails {
    #[serde(with = "iso_date")]
    pub date: Date,
    pub time_slot: String,
    pub charger_type: String,
    pub plug_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleDetails {
    pub vehicle_type: String,
    pub vehicle_brand: String,
    pub vehicle_model: String,
    pub vehicle_number: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub booking_id: String,
    pub user_id: Uuid,
    pub user_name: String,
    #[serde(flatten)]
    pub station: StationDetails,
    #[serde(flatten)]
    pub slot: SlotDetails,
    #[serde(flatten)]
    pub vehicle: VehicleDetails,
    pub amount: i64,
    pub payment_method: Option<PaymentMethod>,
    pub status: BookingStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub booking_time: OffsetDateTime,
}

impl Booking {
    pub fn summary(&self) -> BookingSummary {
        BookingSummary {
            booking_id: self.booking_id.clone(),
            station_name: self.station.station_name.clone(),
            date: self.slot.date,
            time_slot: self.slot.time_slot.clone(),
            status: self.status,
            booking_time: self.booking_time,
        }
    }

    pub fn profile_entry(&self) -> ProfileBooking {
        let fmt = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
        ProfileBooking {
            booking_id: self.booking_id.clone(),
            station: self.station.clone(),
            slot: self.slot.clone(),
            vehicle: self.vehicle.clone(),
            amount: self.amount,
            payment_method: self.payment_method,
            status: self.status,
            booking_time: self
                .booking_time
                .format(&fmt)
                .unwrap_or_else(|_| self.booking_time.to_string()),
        }
    }
}

/// The copy of a booking kept inside the owning user's record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingSummary {
    pub booking_id: String,
    pub station_name: String,
    #[serde(with = "iso_date")]
    pub date: Date,
    pub time_slot: String,
    pub status: BookingStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub booking_time: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileBooking {
    pub booking_id: String,
    #[serde(flatten)]
    pub station: StationDetails,
    #[serde(flatten)]
    pub slot: SlotDetails,
    #[serde(flatten)]
    pub vehicle: VehicleDetails,
    pub amount: i64,
    pub payment_method: Option<PaymentMethod>,
    pub status: BookingStatus,
    pub booking_time: String,
}

/// Validated booking input, before an id and owner are attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingDraft {
    pub station: StationDetails,
    pub slot: SlotDetails,
    pub vehicle: VehicleDetails,
    pub amount: i64,
    pub payment_method: Option<PaymentMethod>,
}

/// Loosely typed booking fields as they arrive from a form or JSON body.
#[derive(Debug, Clone, Default)]
pub struct RawBooking {
    pub station_id: Option<String>,
    pub station_name: Option<String>,
    pub date: Option<String>,
    pub time_slot: Option<String>,
    pub charger_type: Option<String>,
    pub plug_type: Option<String>,
    pub vehicle_type: Option<String>,
    pub vehicle_brand: Option<String>,
    pub vehicle_model: Option<String>,
    pub vehicle_number: Option<String>,
    pub amount: Option<i64>,
    pub payment_method: Option<String>,
}

impl RawBooking {
    pub fn into_draft(self) -> Result<BookingDraft, ApiError> {
        let date_raw = required("date", self.date)?;
        let date = Date::parse(&date_raw, format_description!("[year]-[month]-[day]"))
            .map_err(|_| ApiError::Validation(format!("date `{date_raw}` is not YYYY-MM-DD")))?;

        let time_slot = required("time_slot", self.time_slot)?;
        if !TIME_SLOTS.contains(&time_slot.as_str()) {
            return Err(ApiError::Validation(format!(
                "time slot `{time_slot}` is not offered"
            )));
        }

        let amount = self.amount.unwrap_or(DEFAULT_SLOT_PRICE);
        if amount < 0 {
            return Err(ApiError::Validation("amount must not be negative".into()));
        }

        let payment_method = optional(self.payment_method)
            .map(|m| m.parse::<PaymentMethod>().map_err(ApiError::Validation))
            .transpose()?;

        Ok(BookingDraft {
            station: StationDetails {
                station_id: optional(self.station_id),
                station_name: required("station_name", self.station_name)?,
            },
            slot: SlotDetails {
                date,
                time_slot,
                charger_type: required("charger_type", self.charger_type)?,
                plug_type: optional(self.plug_type),
            },
            vehicle: VehicleDetails {
                vehicle_type: required("vehicle_type", self.vehicle_type)?,
                vehicle_brand: required("vehicle_brand", self.vehicle_brand)?,
                vehicle_model: required("vehicle_model", self.vehicle_model)?,
                vehicle_number: required("vehicle_number", self.vehicle_number)?,
            },
            amount,
            payment_method,
        })
    }
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(field: &str, value: Option<String>) -> Result<String, ApiError> {
    optional(value).ok_or_else(|| ApiError::Validation(format!("{field} is required")))
}
