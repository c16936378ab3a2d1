use std::sync::Arc;

use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::booking::{
    generate_booking_id, Booking, BookingDraft, BookingIdPrefix, BookingStatus,
};
use crate::domain::payment::{PaymentDetails, PaymentRecord};
use crate::domain::user::User;
use crate::error::ApiError;
use crate::infra::store::{BookingStore, Store, BOOKINGS_BOOKING_ID_KEY, PAYMENTS_BOOKING_ID_KEY};

/// Attempts at finding an unused `booking_id` before giving up.
const BOOKING_ID_ATTEMPTS: usize = 3;

#[derive(Clone)]
pub struct BookingService {
    store: Arc<dyn Store>,
}

impl BookingService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Books a slot for `owner` without recording a payment.
    #[tracing::instrument(skip(self, owner, draft), fields(user_id = %owner.id))]
    pub async fn create_booking(
        &self,
        owner: &User,
        draft: BookingDraft,
        prefix: BookingIdPrefix,
    ) -> Result<Booking, ApiError> {
        let (booking, _) = self.persist(owner, draft, prefix, None).await?;
        Ok(booking)
    }

    /// Books a slot and records its payment in the same write.
    /// The draft must name a payment method.
    #[tracing::instrument(skip(self, owner, draft, details), fields(user_id = %owner.id))]
    pub async fn place_booking(
        &self,
        owner: &User,
        draft: BookingDraft,
        prefix: BookingIdPrefix,
        details: Option<PaymentDetails>,
    ) -> Result<(Booking, PaymentRecord), ApiError> {
        if draft.payment_method.is_none() {
            return Err(ApiError::Validation("payment_method is required".into()));
        }
        let (booking, payment) = self.persist(owner, draft, prefix, Some(details)).await?;
        let payment = payment.ok_or_else(|| ApiError::Internal("payment record missing".into()))?;
        Ok((booking, payment))
    }

    async fn persist(
        &self,
        owner: &User,
        draft: BookingDraft,
        prefix: BookingIdPrefix,
        details: Option<Option<PaymentDetails>>,
    ) -> Result<(Booking, Option<PaymentRecord>), ApiError> {
        for attempt in 1..=BOOKING_ID_ATTEMPTS {
            let now = OffsetDateTime::now_utc();
            let booking = Booking {
                id: Uuid::new_v4(),
                booking_id: generate_booking_id(prefix, now),
                user_id: owner.id,
                user_name: owner.name.clone(),
                station: draft.station.clone(),
                slot: draft.slot.clone(),
                vehicle: draft.vehicle.clone(),
                amount: draft.amount,
                payment_method: draft.payment_method,
                status: BookingStatus::Active,
                booking_time: now,
            };
            let payment = match (&details, booking.payment_method) {
                (Some(details), Some(method)) => Some(PaymentRecord::completed(
                    &booking.booking_id,
                    method,
                    booking.amount,
                    details.clone(),
                    now,
                )),
                _ => None,
            };

            match self.store.insert_booking(&booking, payment.as_ref()).await {
                Ok(()) => {
                    info!(booking_id = %booking.booking_id, "booking created");
                    return Ok((booking, payment));
                }
                Err(e)
                    if e.is_conflict_on(BOOKINGS_BOOKING_ID_KEY)
                        || e.is_conflict_on(PAYMENTS_BOOKING_ID_KEY) =>
                {
                    warn!(attempt, booking_id = %booking.booking_id, "booking id collision, regenerating");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(ApiError::Internal(format!(
            "no free booking id after {BOOKING_ID_ATTEMPTS} attempts"
        )))
    }

    pub async fn list_user_bookings(&self, user_id: Uuid) -> Result<Vec<Booking>, ApiError> {
        Ok(self.store.list_bookings_for_user(user_id).await?)
    }

    pub async fn get_booking(&self, booking_id: &str) -> Result<Booking, ApiError> {
        self.store
            .find_booking(booking_id)
            .await?
            .ok_or(ApiError::NotFound("Booking"))
    }

    /// Like [`get_booking`](Self::get_booking), but another user's booking reads as missing.
    pub async fn get_owned_booking(
        &self,
        booking_id: &str,
        user_id: Uuid,
    ) -> Result<Booking, ApiError> {
        let booking = self.get_booking(booking_id).await?;
        if booking.user_id != user_id {
            return Err(ApiError::NotFound("Booking"));
        }
        Ok(booking)
    }

    #[tracing::instrument(skip(self))]
    pub async fn cancel_booking(
        &self,
        booking_id: &str,
        requesting_user_id: Uuid,
    ) -> Result<(), ApiError> {
        let booking = self.get_booking(booking_id).await?;
        if booking.user_id != requesting_user_id {
            return Err(ApiError::Unauthorized("Unauthorized to cancel this booking"));
        }
        if booking.status == BookingStatus::Cancelled {
            return Err(ApiError::AlreadyCancelled);
        }

        let moved = self
            .store
            .transition_status(booking_id, BookingStatus::Active, BookingStatus::Cancelled)
            .await?;
        if !moved {
            // Lost a race with another cancel of the same booking.
            return Err(ApiError::AlreadyCancelled);
        }
        info!("booking cancelled");
        Ok(())
    }
}
