use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tripdesk_core::agent::{ComplianceDocument, PostalAddress};
use tripdesk_core::repository::{AgentRepository, RepositoryError, RepositoryResult};
use tripdesk_core::{Activation, Agent, AgentStatus, CoreError};
use tripdesk_shared::Masked;
use uuid::Uuid;

use crate::database::{invalid_column, map_db_error};

const AGENT_COLUMNS: &str = "id, agent_code, user_id, company_name, contact_person, email, phone, \
     address, city, state, country, pincode, \
     trade_licence_number, trade_licence_url, pan_number, pan_url, aadhaar_number, aadhaar_url, \
     commission_rate, status, password, created_at, updated_at";

pub struct StoreAgentRepository {
    pool: PgPool,
}

impl StoreAgentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct AgentRow {
    id: Uuid,
    agent_code: Option<String>,
    user_id: Option<Uuid>,
    company_name: String,
    contact_person: String,
    email: String,
    phone: String,
    address: Option<String>,
    city: Option<String>,
    state: Option<String>,
    country: Option<String>,
    pincode: Option<String>,
    trade_licence_number: Option<String>,
    trade_licence_url: Option<String>,
    pan_number: Option<String>,
    pan_url: Option<String>,
    aadhaar_number: Option<String>,
    aadhaar_url: Option<String>,
    commission_rate: f64,
    status: String,
    password: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn document<N>(
    column: &str,
    number: Option<String>,
    file_url: Option<String>,
) -> RepositoryResult<Option<ComplianceDocument<N>>>
where
    N: TryFrom<String, Error = CoreError>,
{
    match number {
        Some(number) => {
            let number = N::try_from(number).map_err(|e| invalid_column(column, e))?;
            Ok(Some(ComplianceDocument::new(number, file_url)))
        }
        None => Ok(None),
    }
}

impl TryFrom<AgentRow> for Agent {
    type Error = RepositoryError;

    fn try_from(row: AgentRow) -> Result<Self, Self::Error> {
        Ok(Agent {
            id: row.id,
            agent_code: row.agent_code,
            user_id: row.user_id,
            company_name: row.company_name,
            contact_person: row.contact_person,
            email: row.email,
            phone: row.phone,
            address: PostalAddress {
                address: row.address,
                city: row.city,
                state: row.state,
                country: row.country,
                pincode: row.pincode,
            },
            trade_licence: document("trade_licence_number", row.trade_licence_number, row.trade_licence_url)?,
            pan: document("pan_number", row.pan_number, row.pan_url)?,
            aadhaar: document("aadhaar_number", row.aadhaar_number, row.aadhaar_url)?,
            commission_rate: row.commission_rate,
            status: row.status.parse().map_err(|e| invalid_column("status", e))?,
            password: row.password.map(Masked),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_agents(rows: Vec<AgentRow>) -> RepositoryResult<Vec<Agent>> {
    rows.into_iter().map(Agent::try_from).collect()
}

#[async_trait]
impl AgentRepository for StoreAgentRepository {
    async fn insert(&self, agent: &Agent) -> RepositoryResult<()> {
        let sql = format!(
            "INSERT INTO agents ({}) VALUES \
             ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, $23)",
            AGENT_COLUMNS
        );

        sqlx::query(&sql)
            .bind(agent.id)
            .bind(agent.agent_code.as_deref())
            .bind(agent.user_id)
            .bind(&agent.company_name)
            .bind(&agent.contact_person)
            .bind(&agent.email)
            .bind(&agent.phone)
            .bind(agent.address.address.as_deref())
            .bind(agent.address.city.as_deref())
            .bind(agent.address.state.as_deref())
            .bind(agent.address.country.as_deref())
            .bind(agent.address.pincode.as_deref())
            .bind(agent.trade_licence.as_ref().map(|d| d.number.as_str()))
            .bind(agent.trade_licence.as_ref().and_then(|d| d.file_url.as_deref()))
            .bind(agent.pan.as_ref().map(|d| d.number.as_str()))
            .bind(agent.pan.as_ref().and_then(|d| d.file_url.as_deref()))
            .bind(agent.aadhaar.as_ref().map(|d| d.number.as_str()))
            .bind(agent.aadhaar.as_ref().and_then(|d| d.file_url.as_deref()))
            .bind(agent.commission_rate)
            .bind(agent.status.as_str())
            .bind(agent.password.as_ref().map(|p| p.expose().as_str()))
            .bind(agent.created_at)
            .bind(agent.updated_at)
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> RepositoryResult<Option<Agent>> {
        let sql = format!("SELECT {} FROM agents WHERE id = $1", AGENT_COLUMNS);
        let row = sqlx::query_as::<_, AgentRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?;

        row.map(Agent::try_from).transpose()
    }

    async fn find_by_user(&self, user_id: Uuid) -> RepositoryResult<Option<Agent>> {
        let sql = format!("SELECT {} FROM agents WHERE user_id = $1", AGENT_COLUMNS);
        let row = sqlx::query_as::<_, AgentRow>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?;

        row.map(Agent::try_from).transpose()
    }

    async fn list(&self, status: Option<AgentStatus>) -> RepositoryResult<Vec<Agent>> {
        let sql = format!(
            "SELECT {} FROM agents WHERE ($1::text IS NULL OR status = $1) ORDER BY created_at DESC",
            AGENT_COLUMNS
        );
        let rows = sqlx::query_as::<_, AgentRow>(&sql)
            .bind(status.map(|s| s.as_str()))
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)?;

        into_agents(rows)
    }

    async fn save_profile(&self, agent: &Agent) -> RepositoryResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE agents SET
                company_name = $2, contact_person = $3, email = $4, phone = $5,
                address = $6, city = $7, state = $8, country = $9, pincode = $10,
                trade_licence_number = $11, trade_licence_url = $12,
                pan_number = $13, pan_url = $14,
                aadhaar_number = $15, aadhaar_url = $16,
                commission_rate = $17, updated_at = $18
            WHERE id = $1
            "#,
        )
        .bind(agent.id)
        .bind(&agent.company_name)
        .bind(&agent.contact_person)
        .bind(&agent.email)
        .bind(&agent.phone)
        .bind(agent.address.address.as_deref())
        .bind(agent.address.city.as_deref())
        .bind(agent.address.state.as_deref())
        .bind(agent.address.country.as_deref())
        .bind(agent.address.pincode.as_deref())
        .bind(agent.trade_licence.as_ref().map(|d| d.number.as_str()))
        .bind(agent.trade_licence.as_ref().and_then(|d| d.file_url.as_deref()))
        .bind(agent.pan.as_ref().map(|d| d.number.as_str()))
        .bind(agent.pan.as_ref().and_then(|d| d.file_url.as_deref()))
        .bind(agent.aadhaar.as_ref().map(|d| d.number.as_str()))
        .bind(agent.aadhaar.as_ref().and_then(|d| d.file_url.as_deref()))
        .bind(agent.commission_rate)
        .bind(agent.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("agent {}", agent.id)));
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> RepositoryResult<bool> {
        let result = sqlx::query("DELETE FROM agents WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn generate_agent_code(&self) -> RepositoryResult<String> {
        sqlx::query_scalar::<_, String>("SELECT generate_agent_code()")
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_error)
    }

    async fn activate(
        &self,
        id: Uuid,
        from: AgentStatus,
        activation: &Activation,
    ) -> RepositoryResult<Agent> {
        let sql = format!(
            "UPDATE agents SET status = 'active', agent_code = $2, password = $3, user_id = $4, updated_at = now() \
             WHERE id = $1 AND status = $5 RETURNING {}",
            AGENT_COLUMNS
        );
        let row = sqlx::query_as::<_, AgentRow>(&sql)
            .bind(id)
            .bind(&activation.agent_code)
            .bind(activation.password.expose().as_str())
            .bind(activation.user_id)
            .bind(from.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?;

        match row {
            Some(row) => Agent::try_from(row),
            None => Err(RepositoryError::StatusMismatch { agent_id: id, expected: from }),
        }
    }

    async fn transition_status(
        &self,
        id: Uuid,
        from: AgentStatus,
        to: AgentStatus,
    ) -> RepositoryResult<Agent> {
        let sql = format!(
            "UPDATE agents SET status = $3, updated_at = now() WHERE id = $1 AND status = $2 RETURNING {}",
            AGENT_COLUMNS
        );
        let row = sqlx::query_as::<_, AgentRow>(&sql)
            .bind(id)
            .bind(from.as_str())
            .bind(to.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?;

        match row {
            Some(row) => Agent::try_from(row),
            None => Err(RepositoryError::StatusMismatch { agent_id: id, expected: from }),
        }
    }
}
