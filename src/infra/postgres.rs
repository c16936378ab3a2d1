use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use super::db::Db;
use super::store::{BookingStore, PaymentStore, Store, StoreError, UserDirectoryStore};
use crate::domain::booking::{
    Booking, BookingStatus, BookingSummary, SlotDetails, StationDetails, VehicleDetails,
};
use crate::domain::payment::{PaymentDetails, PaymentMethod, PaymentRecord, PaymentStatus};
use crate::domain::user::User;

const USER_COLUMNS: &str = "id, name, email, phone, password_hash, created_at, bookings";

const BOOKING_COLUMNS: &str = "id, booking_id, user_id, user_name, station_id, station_name, date, \
     time_slot, charger_type, plug_type, vehicle_type, vehicle_brand, vehicle_model, \
     vehicle_number, amount, payment_method, status, booking_time";

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if let Some(constraint) = db_err.constraint() {
                return StoreError::Conflict(constraint.to_string());
            }
        }
        StoreError::Backend(err.to_string())
    }
}

#[derive(Clone)]
pub struct PgStore {
    pool: Db,
}

impl PgStore {
    pub fn new(pool: Db) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    email: Option<String>,
    phone: Option<String>,
    password_hash: String,
    created_at: OffsetDateTime,
    bookings: Json<Vec<BookingSummary>>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            name: row.name,
            email: row.email,
            phone: row.phone,
            password_hash: row.password_hash,
            created_at: row.created_at,
            bookings: row.bookings.0,
        }
    }
}

#[derive(FromRow)]
struct BookingRow {
    id: Uuid,
    booking_id: String,
    user_id: Uuid,
    user_name: String,
    station_id: Option<String>,
    station_name: String,
    date: Date,
    time_slot: String,
    charger_type: String,
    plug_type: Option<String>,
    vehicle_type: String,
    vehicle_brand: String,
    vehicle_model: String,
    vehicle_number: String,
    amount: i64,
    payment_method: Option<String>,
    status: String,
    booking_time: OffsetDateTime,
}

impl TryFrom<BookingRow> for Booking {
    type Error = StoreError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        let status = row.status.parse::<BookingStatus>().map_err(StoreError::Backend)?;
        let payment_method = row
            .payment_method
            .map(|m| m.parse::<PaymentMethod>())
            .transpose()
            .map_err(StoreError::Backend)?;
        Ok(Booking {
            id: row.id,
            booking_id: row.booking_id,
            user_id: row.user_id,
            user_name: row.user_name,
            station: StationDetails {
                station_id: row.station_id,
                station_name: row.station_name,
            },
            slot: SlotDetails {
                date: row.date,
                time_slot: row.time_slot,
                charger_type: row.charger_type,
                plug_type: row.plug_type,
            },
            vehicle: VehicleDetails {
                vehicle_type: row.vehicle_type,
                vehicle_brand: row.vehicle_brand,
                vehicle_model: row.vehicle_model,
                vehicle_number: row.vehicle_number,
            },
            amount: row.amount,
            payment_method,
            status,
            booking_time: row.booking_time,
        })
    }
}

#[derive(FromRow)]
struct PaymentRow {
    booking_id: String,
    payment_method: String,
    amount: i64,
    details: Option<Json<PaymentDetails>>,
    payment_status: String,
    created_at: OffsetDateTime,
}

impl TryFrom<PaymentRow> for PaymentRecord {
    type Error = StoreError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        let payment_method = row
            .payment_method
            .parse::<PaymentMethod>()
            .map_err(StoreError::Backend)?;
        if row.payment_status != "completed" {
            return Err(StoreError::Backend(format!(
                "unexpected payment status `{}`",
                row.payment_status
            )));
        }
        Ok(PaymentRecord {
            booking_id: row.booking_id,
            payment_method,
            amount: row.amount,
            details: row.details.map(|d| d.0),
            payment_status: PaymentStatus::Completed,
            created_at: row.created_at,
        })
    }
}

async fn insert_payment_row<'e, E>(executor: E, record: &PaymentRecord) -> Result<(), StoreError>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query(
        "INSERT INTO payments (booking_id, payment_method, amount, details, payment_status, created_at)
         VALUES ($1, $2, $3, $4, 'completed', $5)",
    )
    .bind(&record.booking_id)
    .bind(record.payment_method.as_str())
    .bind(record.amount)
    .bind(record.details.as_ref().map(Json))
    .bind(record.created_at)
    .execute(executor)
    .await?;
    Ok(())
}

impl Store for PgStore {
    fn backend_tag(&self) -> &'static str {
        "postgres"
    }
}

#[async_trait]
impl UserDirectoryStore for PgStore {
    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO users (id, name, email, phone, password_hash, created_at, bookings)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .bind(Json(&user.bookings))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    async fn find_user_by_phone(&self, phone: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE phone = $1"
        ))
        .bind(phone)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }
}

#[async_trait]
impl BookingStore for PgStore {
    async fn insert_booking(
        &self,
        booking: &Booking,
        payment: Option<&PaymentRecord>,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(&format!(
            "INSERT INTO bookings ({BOOKING_COLUMNS})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)"
        ))
        .bind(booking.id)
        .bind(&booking.booking_id)
        .bind(booking.user_id)
        .bind(&booking.user_name)
        .bind(&booking.station.station_id)
        .bind(&booking.station.station_name)
        .bind(booking.slot.date)
        .bind(&booking.slot.time_slot)
        .bind(&booking.slot.charger_type)
        .bind(&booking.slot.plug_type)
        .bind(&booking.vehicle.vehicle_type)
        .bind(&booking.vehicle.vehicle_brand)
        .bind(&booking.vehicle.vehicle_model)
        .bind(&booking.vehicle.vehicle_number)
        .bind(booking.amount)
        .bind(booking.payment_method.map(PaymentMethod::as_str))
        .bind(booking.status.as_str())
        .bind(booking.booking_time)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE users SET bookings = bookings || $2 WHERE id = $1")
            .bind(booking.user_id)
            .bind(Json(vec![booking.summary()]))
            .execute(&mut *tx)
            .await?;

        if let Some(record) = payment {
            insert_payment_row(&mut *tx, record).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn find_booking(&self, booking_id: &str) -> Result<Option<Booking>, StoreError> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE booking_id = $1"
        ))
        .bind(booking_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Booking::try_from).transpose()
    }

    async fn list_bookings_for_user(&self, user_id: Uuid) -> Result<Vec<Booking>, StoreError> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE user_id = $1
             ORDER BY booking_time DESC, booking_id DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Booking::try_from).collect()
    }

    async fn transition_status(
        &self,
        booking_id: &str,
        from: BookingStatus,
        to: BookingStatus,
    ) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;

        let owner: Option<Uuid> = sqlx::query_scalar(
            "UPDATE bookings SET status = $3 WHERE booking_id = $1 AND status = $2 RETURNING user_id",
        )
        .bind(booking_id)
        .bind(from.as_str())
        .bind(to.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(owner) = owner else {
            return Ok(false);
        };

        sqlx::query(
            "UPDATE users SET bookings = (
                 SELECT COALESCE(
                     jsonb_agg(
                         CASE WHEN elem->>'booking_id' = $2
                              THEN jsonb_set(elem, '{status}', to_jsonb($3::text))
                              ELSE elem END
                         ORDER BY ord),
                     '[]'::jsonb)
                 FROM jsonb_array_elements(bookings) WITH ORDINALITY AS t(elem, ord)
             )
             WHERE id = $1",
        )
        .bind(owner)
        .bind(booking_id)
        .bind(to.as_str())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }
}

#[async_trait]
impl PaymentStore for PgStore {
    async fn insert_payment(&self, record: &PaymentRecord) -> Result<(), StoreError> {
        insert_payment_row(&self.pool, record).await
    }

    async fn find_payment(&self, booking_id: &str) -> Result<Option<PaymentRecord>, StoreError> {
        let row = sqlx::query_as::<_, PaymentRow>(
            "SELECT booking_id, payment_method, amount, details, payment_status, created_at
             FROM payments WHERE booking_id = $1",
        )
        .bind(booking_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(PaymentRecord::try_from).transpose()
    }
}
