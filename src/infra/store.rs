use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::booking::{Booking, BookingStatus};
use crate::domain::payment::PaymentRecord;
use crate::domain::user::User;

pub const USERS_EMAIL_KEY: &str = "users_email_key";
pub const USERS_PHONE_KEY: &str = "users_phone_key";
pub const BOOKINGS_BOOKING_ID_KEY: &str = "bookings_booking_id_key";
pub const PAYMENTS_BOOKING_ID_KEY: &str = "payments_booking_id_key";

#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique constraint rejected the write. Carries the constraint name.
    #[error("unique constraint `{0}` violated")]
    Conflict(String),
    #[error("{0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_conflict_on(&self, constraint: &str) -> bool {
        matches!(self, StoreError::Conflict(c) if c == constraint)
    }
}

#[async_trait]
pub trait UserDirectoryStore: Send + Sync {
    async fn insert_user(&self, user: &User) -> Result<(), StoreError>;
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_user_by_phone(&self, phone: &str) -> Result<Option<User>, StoreError>;
}

#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Persists the booking, appends its summary to the owner's mirrored list and,
    /// when given, stores the payment record. All of it lands or none of it does.
    async fn insert_booking(
        &self,
        booking: &Booking,
        payment: Option<&PaymentRecord>,
    ) -> Result<(), StoreError>;

    async fn find_booking(&self, booking_id: &str) -> Result<Option<Booking>, StoreError>;

    /// Newest first by `booking_time`, then by `booking_id`.
    async fn list_bookings_for_user(&self, user_id: Uuid) -> Result<Vec<Booking>, StoreError>;

    /// Moves the booking and its mirrored summary from `from` to `to` together.
    /// Returns `false` when the booking was not in `from` (or does not exist).
    async fn transition_status(
        &self,
        booking_id: &str,
        from: BookingStatus,
        to: BookingStatus,
    ) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn insert_payment(&self, record: &PaymentRecord) -> Result<(), StoreError>;
    async fn find_payment(&self, booking_id: &str) -> Result<Option<PaymentRecord>, StoreError>;
}

pub trait Store: UserDirectoryStore + BookingStore + PaymentStore {
    fn backend_tag(&self) -> &'static str;
}
