use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::store::{
    BookingStore, PaymentStore, Store, StoreError, UserDirectoryStore, BOOKINGS_BOOKING_ID_KEY,
    PAYMENTS_BOOKING_ID_KEY, USERS_EMAIL_KEY, USERS_PHONE_KEY,
};
use crate::domain::booking::{Booking, BookingStatus};
use crate::domain::payment::PaymentRecord;
use crate::domain::user::User;

#[derive(Default)]
struct Collections {
    users: HashMap<Uuid, User>,
    bookings: HashMap<String, Booking>,
    payments: HashMap<String, PaymentRecord>,
}

/// Process-local store. One lock guards every collection, so multi-collection
/// writes are as atomic here as a transaction is in Postgres.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn backend_tag(&self) -> &'static str {
        "memory"
    }
}

#[async_trait]
impl UserDirectoryStore for MemoryStore {
    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        for existing in inner.users.values() {
            if user.email.is_some() && existing.email == user.email {
                return Err(StoreError::Conflict(USERS_EMAIL_KEY.into()));
            }
            if user.phone.is_some() && existing.phone == user.phone {
                return Err(StoreError::Conflict(USERS_PHONE_KEY.into()));
            }
        }
        inner.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.inner.lock().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .users
            .values()
            .find(|u| u.email.as_deref() == Some(email))
            .cloned())
    }

    async fn find_user_by_phone(&self, phone: &str) -> Result<Option<User>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .users
            .values()
            .find(|u| u.phone.as_deref() == Some(phone))
            .cloned())
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn insert_booking(
        &self,
        booking: &Booking,
        payment: Option<&PaymentRecord>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.bookings.contains_key(&booking.booking_id) {
            return Err(StoreError::Conflict(BOOKINGS_BOOKING_ID_KEY.into()));
        }
        if let Some(p) = payment {
            if inner.payments.contains_key(&p.booking_id) {
                return Err(StoreError::Conflict(PAYMENTS_BOOKING_ID_KEY.into()));
            }
        }
        // A missing owner leaves nothing to mirror into, same as an UPDATE matching no row.
        if let Some(owner) = inner.users.get_mut(&booking.user_id) {
            owner.bookings.push(booking.summary());
        }
        inner
            .bookings
            .insert(booking.booking_id.clone(), booking.clone());
        if let Some(p) = payment {
            inner.payments.insert(p.booking_id.clone(), p.clone());
        }
        Ok(())
    }

    async fn find_booking(&self, booking_id: &str) -> Result<Option<Booking>, StoreError> {
        Ok(self.inner.lock().await.bookings.get(booking_id).cloned())
    }

    async fn list_bookings_for_user(&self, user_id: Uuid) -> Result<Vec<Booking>, StoreError> {
        let inner = self.inner.lock().await;
        let mut rows: Vec<Booking> = inner
            .bookings
            .values()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.booking_time
                .cmp(&a.booking_time)
                .then_with(|| b.booking_id.cmp(&a.booking_id))
        });
        Ok(rows)
    }

    async fn transition_status(
        &self,
        booking_id: &str,
        from: BookingStatus,
        to: BookingStatus,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        let owner = match inner.bookings.get_mut(booking_id) {
            Some(b) if b.status == from => {
                b.status = to;
                b.user_id
            }
            _ => return Ok(false),
        };
        if let Some(user) = inner.users.get_mut(&owner) {
            for summary in user.bookings.iter_mut().filter(|s| s.booking_id == booking_id) {
                summary.status = to;
            }
        }
        Ok(true)
    }
}

#[async_trait]
impl PaymentStore for MemoryStore {
    async fn insert_payment(&self, record: &PaymentRecord) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.payments.contains_key(&record.booking_id) {
            return Err(StoreError::Conflict(PAYMENTS_BOOKING_ID_KEY.into()));
        }
        inner
            .payments
            .insert(record.booking_id.clone(), record.clone());
        Ok(())
    }

    async fn find_payment(&self, booking_id: &str) -> Result<Option<PaymentRecord>, StoreError> {
        Ok(self.inner.lock().await.payments.get(booking_id).cloned())
    }
}
