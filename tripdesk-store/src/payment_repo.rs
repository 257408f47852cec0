use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use tripdesk_core::payment::PaymentFilter;
use tripdesk_core::repository::{PaymentRepository, RepositoryError, RepositoryResult};
use tripdesk_core::Payment;
use uuid::Uuid;

use crate::database::{invalid_column, map_db_error};

const PAYMENT_COLUMNS: &str = "id, booking_id, agent_id, amount, payment_method, payment_status, \
     transaction_id, payment_date, created_at, updated_at";

pub struct StorePaymentRepository {
    pool: PgPool,
}

impl StorePaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    booking_id: Uuid,
    agent_id: Uuid,
    amount: f64,
    payment_method: String,
    payment_status: String,
    transaction_id: Option<String>,
    payment_date: NaiveDate,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = RepositoryError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(Payment {
            id: row.id,
            booking_id: row.booking_id,
            agent_id: row.agent_id,
            amount: row.amount,
            payment_method: row.payment_method.parse().map_err(|e| invalid_column("payment_method", e))?,
            payment_status: row.payment_status.parse().map_err(|e| invalid_column("payment_status", e))?,
            transaction_id: row.transaction_id,
            payment_date: row.payment_date,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl PaymentRepository for StorePaymentRepository {
    async fn insert(&self, payment: &Payment) -> RepositoryResult<()> {
        let sql = format!(
            "INSERT INTO payments ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
            PAYMENT_COLUMNS
        );

        sqlx::query(&sql)
            .bind(payment.id)
            .bind(payment.booking_id)
            .bind(payment.agent_id)
            .bind(payment.amount)
            .bind(payment.payment_method.as_str())
            .bind(payment.payment_status.as_str())
            .bind(payment.transaction_id.as_deref())
            .bind(payment.payment_date)
            .bind(payment.created_at)
            .bind(payment.updated_at)
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> RepositoryResult<Option<Payment>> {
        let sql = format!("SELECT {} FROM payments WHERE id = $1", PAYMENT_COLUMNS);
        let row = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?;

        row.map(Payment::try_from).transpose()
    }

    async fn list(&self, filter: &PaymentFilter) -> RepositoryResult<Vec<Payment>> {
        let sql = format!(
            "SELECT {} FROM payments \
             WHERE ($1::uuid IS NULL OR agent_id = $1) AND ($2::uuid IS NULL OR booking_id = $2) \
             ORDER BY created_at DESC",
            PAYMENT_COLUMNS
        );
        let rows = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(filter.agent_id)
            .bind(filter.booking_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)?;

        rows.into_iter().map(Payment::try_from).collect()
    }

    async fn save(&self, payment: &Payment) -> RepositoryResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE payments SET
                booking_id = $2, agent_id = $3, amount = $4,
                payment_method = $5, payment_status = $6, transaction_id = $7,
                payment_date = $8, updated_at = $9
            WHERE id = $1
            "#,
        )
        .bind(payment.id)
        .bind(payment.booking_id)
        .bind(payment.agent_id)
        .bind(payment.amount)
        .bind(payment.payment_method.as_str())
        .bind(payment.payment_status.as_str())
        .bind(payment.transaction_id.as_deref())
        .bind(payment.payment_date)
        .bind(payment.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("payment {}", payment.id)));
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> RepositoryResult<bool> {
        let result = sqlx::query("DELETE FROM payments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;

        Ok(result.rows_affected() > 0)
    }
}
