use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;
use tracing::info;
use tripdesk_core::repository::RepositoryError;

#[derive(Clone)]
pub struct DbClient {
    pub pool: Pool<Postgres>,
}

impl DbClient {
    pub async fn new(connection_string: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(connection_string)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations")
            .run(&self.pool)
            .await?;
        info!("Migrations completed successfully.");
        Ok(())
    }
}

/// Translate driver errors into the repository taxonomy, keeping constraint names.
pub(crate) fn map_db_error(err: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(db) = &err {
        let constraint = db.constraint().unwrap_or("unknown").to_string();
        if db.is_unique_violation() {
            return RepositoryError::Conflict { constraint };
        }
        if db.is_foreign_key_violation() {
            return RepositoryError::ReferenceViolation { constraint };
        }
    }
    RepositoryError::Database(err.to_string())
}

pub(crate) fn invalid_column(column: &str, err: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::InvalidData(format!("{}: {}", column, err))
}
