use std::sync::Arc;

use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::domain::booking::Booking;
use crate::domain::payment::{PaymentDetails, PaymentMethod, PaymentRecord};
use crate::error::ApiError;
use crate::infra::store::{BookingStore, PaymentStore, Store, PAYMENTS_BOOKING_ID_KEY};

/// Records declared payments. There is no gateway behind this: every record is `completed`.
#[derive(Clone)]
pub struct PaymentService {
    store: Arc<dyn Store>,
}

impl PaymentService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    #[tracing::instrument(skip(self, details))]
    pub async fn record_payment(
        &self,
        booking_id: &str,
        requesting_user_id: Uuid,
        method: PaymentMethod,
        amount: i64,
        details: Option<PaymentDetails>,
    ) -> Result<PaymentRecord, ApiError> {
        self.owned_booking(booking_id, requesting_user_id).await?;
        if amount < 0 {
            return Err(ApiError::Validation("amount must not be negative".into()));
        }

        let record = PaymentRecord::completed(
            booking_id,
            method,
            amount,
            details,
            OffsetDateTime::now_utc(),
        );
        match self.store.insert_payment(&record).await {
            Ok(()) => {}
            Err(e) if e.is_conflict_on(PAYMENTS_BOOKING_ID_KEY) => {
                return Err(ApiError::PaymentAlreadyRecorded)
            }
            Err(e) => return Err(e.into()),
        }
        info!("payment recorded");
        Ok(record)
    }

    pub async fn get_payment(
        &self,
        booking_id: &str,
        requesting_user_id: Uuid,
    ) -> Result<PaymentRecord, ApiError> {
        let booking = self.owned_booking(booking_id, requesting_user_id).await?;
        self.store
            .find_payment(&booking.booking_id)
            .await?
            .ok_or(ApiError::NotFound("Payment"))
    }

    /// Another user's booking reads as missing.
    async fn owned_booking(&self, booking_id: &str, user_id: Uuid) -> Result<Booking, ApiError> {
        self.store
            .find_booking(booking_id)
            .await?
            .filter(|b| b.user_id == user_id)
            .ok_or(ApiError::NotFound("Booking"))
    }
}
