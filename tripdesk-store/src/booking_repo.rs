use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use tripdesk_core::repository::{BookingRepository, RepositoryError, RepositoryResult};
use tripdesk_core::Booking;
use uuid::Uuid;

use crate::database::{invalid_column, map_db_error};

const BOOKING_COLUMNS: &str = "id, booking_reference, agent_id, booking_type, \
     passenger_name, passenger_email, passenger_phone, from_location, to_location, \
     departure_date, return_date, adult_count, child_count, total_amount, commission_amount, \
     status, created_at, updated_at";

pub struct StoreBookingRepository {
    pool: PgPool,
}

impl StoreBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    booking_reference: String,
    agent_id: Uuid,
    booking_type: String,
    passenger_name: String,
    passenger_email: String,
    passenger_phone: String,
    from_location: Option<String>,
    to_location: Option<String>,
    departure_date: Option<NaiveDate>,
    return_date: Option<NaiveDate>,
    adult_count: i32,
    child_count: i32,
    total_amount: f64,
    commission_amount: f64,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = RepositoryError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        Ok(Booking {
            id: row.id,
            booking_reference: row.booking_reference,
            agent_id: row.agent_id,
            booking_type: row.booking_type.parse().map_err(|e| invalid_column("booking_type", e))?,
            passenger_name: row.passenger_name,
            passenger_email: row.passenger_email,
            passenger_phone: row.passenger_phone,
            from_location: row.from_location,
            to_location: row.to_location,
            departure_date: row.departure_date,
            return_date: row.return_date,
            adult_count: row.adult_count,
            child_count: row.child_count,
            total_amount: row.total_amount,
            commission_amount: row.commission_amount,
            status: row.status.parse().map_err(|e| invalid_column("status", e))?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl BookingRepository for StoreBookingRepository {
    async fn insert(&self, booking: &Booking) -> RepositoryResult<()> {
        let sql = format!(
            "INSERT INTO bookings ({}) VALUES \
             ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)",
            BOOKING_COLUMNS
        );

        sqlx::query(&sql)
            .bind(booking.id)
            .bind(&booking.booking_reference)
            .bind(booking.agent_id)
            .bind(booking.booking_type.as_str())
            .bind(&booking.passenger_name)
            .bind(&booking.passenger_email)
            .bind(&booking.passenger_phone)
            .bind(booking.from_location.as_deref())
            .bind(booking.to_location.as_deref())
            .bind(booking.departure_date)
            .bind(booking.return_date)
            .bind(booking.adult_count)
            .bind(booking.child_count)
            .bind(booking.total_amount)
            .bind(booking.commission_amount)
            .bind(booking.status.as_str())
            .bind(booking.created_at)
            .bind(booking.updated_at)
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> RepositoryResult<Option<Booking>> {
        let sql = format!("SELECT {} FROM bookings WHERE id = $1", BOOKING_COLUMNS);
        let row = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?;

        row.map(Booking::try_from).transpose()
    }

    async fn list(&self, agent_id: Option<Uuid>) -> RepositoryResult<Vec<Booking>> {
        let sql = format!(
            "SELECT {} FROM bookings WHERE ($1::uuid IS NULL OR agent_id = $1) ORDER BY created_at DESC",
            BOOKING_COLUMNS
        );
        let rows = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(agent_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)?;

        rows.into_iter().map(Booking::try_from).collect()
    }

    async fn save(&self, booking: &Booking) -> RepositoryResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE bookings SET
                agent_id = $2, booking_type = $3,
                passenger_name = $4, passenger_email = $5, passenger_phone = $6,
                from_location = $7, to_location = $8, departure_date = $9, return_date = $10,
                adult_count = $11, child_count = $12, total_amount = $13, commission_amount = $14,
                status = $15, updated_at = $16
            WHERE id = $1
            "#,
        )
        .bind(booking.id)
        .bind(booking.agent_id)
        .bind(booking.booking_type.as_str())
        .bind(&booking.passenger_name)
        .bind(&booking.passenger_email)
        .bind(&booking.passenger_phone)
        .bind(booking.from_location.as_deref())
        .bind(booking.to_location.as_deref())
        .bind(booking.departure_date)
        .bind(booking.return_date)
        .bind(booking.adult_count)
        .bind(booking.child_count)
        .bind(booking.total_amount)
        .bind(booking.commission_amount)
        .bind(booking.status.as_str())
        .bind(booking.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("booking {}", booking.id)));
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> RepositoryResult<bool> {
        let result = sqlx::query("DELETE FROM bookings WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn generate_reference(&self) -> RepositoryResult<String> {
        sqlx::query_scalar::<_, String>("SELECT generate_booking_reference()")
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_error)
    }
}
