use async_trait::async_trait;
use uuid::Uuid;

use crate::agent::{Activation, Agent, AgentStatus};
use crate::booking::Booking;
use crate::context::Role;
use crate::payment::{Payment, PaymentFilter};

/// Unique constraint backing agent codes
pub const AGENT_CODE_CONSTRAINT: &str = "agents_agent_code_key";
/// Unique constraint backing agent emails
pub const AGENT_EMAIL_CONSTRAINT: &str = "agents_email_key";
/// Unique constraint backing booking references
pub const BOOKING_REFERENCE_CONSTRAINT: &str = "bookings_booking_reference_key";

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record not found: {0}")]
    NotFound(String),
    #[error("unique constraint violated: {constraint}")]
    Conflict { constraint: String },
    /// A guarded update found the row in a different state than expected.
    #[error("agent {agent_id} is no longer {expected}")]
    StatusMismatch { agent_id: Uuid, expected: AgentStatus },
    /// A foreign key rejected the write, either a missing parent or a delete of a referenced row.
    #[error("foreign key violated: {constraint}")]
    ReferenceViolation { constraint: String },
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
    #[error("database error: {0}")]
    Database(String),
}

impl RepositoryError {
    pub fn is_conflict_on(&self, name: &str) -> bool {
        matches!(self, RepositoryError::Conflict { constraint } if constraint == name)
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Repository trait for agent data access
#[async_trait]
pub trait AgentRepository: Send + Sync {
    async fn insert(&self, agent: &Agent) -> RepositoryResult<()>;

    async fn get(&self, id: Uuid) -> RepositoryResult<Option<Agent>>;

    async fn find_by_user(&self, user_id: Uuid) -> RepositoryResult<Option<Agent>>;

    /// Newest first, optionally narrowed to one status.
    async fn list(&self, status: Option<AgentStatus>) -> RepositoryResult<Vec<Agent>>;

    /// Persist profile fields only; status, code, password and user id are left alone.
    async fn save_profile(&self, agent: &Agent) -> RepositoryResult<()>;

    async fn delete(&self, id: Uuid) -> RepositoryResult<bool>;

    /// A fresh agent code not currently assigned to any agent.
    async fn generate_agent_code(&self) -> RepositoryResult<String>;

    /// Single-row update setting status, code, password and user id, guarded by the
    /// expected current status.
    async fn activate(
        &self,
        id: Uuid,
        from: AgentStatus,
        activation: &Activation,
    ) -> RepositoryResult<Agent>;

    /// Single-row status update guarded by the expected current status.
    async fn transition_status(
        &self,
        id: Uuid,
        from: AgentStatus,
        to: AgentStatus,
    ) -> RepositoryResult<Agent>;
}

/// Repository trait for booking data access
#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn insert(&self, booking: &Booking) -> RepositoryResult<()>;

    async fn get(&self, id: Uuid) -> RepositoryResult<Option<Booking>>;

    async fn list(&self, agent_id: Option<Uuid>) -> RepositoryResult<Vec<Booking>>;

    async fn save(&self, booking: &Booking) -> RepositoryResult<()>;

    async fn delete(&self, id: Uuid) -> RepositoryResult<bool>;

    async fn generate_reference(&self) -> RepositoryResult<String>;
}

/// Repository trait for payment data access
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn insert(&self, payment: &Payment) -> RepositoryResult<()>;

    async fn get(&self, id: Uuid) -> RepositoryResult<Option<Payment>>;

    async fn list(&self, filter: &PaymentFilter) -> RepositoryResult<Vec<Payment>>;

    async fn save(&self, payment: &Payment) -> RepositoryResult<()>;

    async fn delete(&self, id: Uuid) -> RepositoryResult<bool>;
}

/// Role assignments for identity accounts
#[async_trait]
pub trait RoleRepository: Send + Sync {
    async fn roles_for(&self, user_id: Uuid) -> RepositoryResult<Vec<Role>>;

    async fn assign(&self, user_id: Uuid, role: Role) -> RepositoryResult<()>;
}
