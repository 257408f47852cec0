use async_trait::async_trait;
use sqlx::PgPool;
use tripdesk_core::repository::{RoleRepository, RepositoryResult};
use tripdesk_core::Role;
use uuid::Uuid;

use crate::database::map_db_error;

pub struct StoreRoleRepository {
    pool: PgPool,
}

impl StoreRoleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoleRepository for StoreRoleRepository {
    async fn roles_for(&self, user_id: Uuid) -> RepositoryResult<Vec<Role>> {
        let rows = sqlx::query_scalar::<_, String>(
            "SELECT role FROM user_roles WHERE user_id = $1 ORDER BY role",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        // Roles this service does not know about grant nothing
        Ok(rows
            .iter()
            .filter_map(|role| match role.as_str() {
                "admin" => Some(Role::Admin),
                "agent" => Some(Role::Agent),
                _ => None,
            })
            .collect())
    }

    async fn assign(&self, user_id: Uuid, role: Role) -> RepositoryResult<()> {
        sqlx::query(
            "INSERT INTO user_roles (user_id, role) VALUES ($1, $2) ON CONFLICT (user_id, role) DO NOTHING",
        )
        .bind(user_id)
        .bind(role.as_str())
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(())
    }
}
