use serde::Serialize;
use tripdesk_core::{AgentStatus, CoreError};
use uuid::Uuid;

/// Failure taxonomy of the status workflow. Every variant is a reported outcome.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkflowError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Agent not found: {0}")]
    NotFound(Uuid),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Identity provider failure: {0}")]
    IdentityProvider(String),

    #[error("Persistence failure: {0}")]
    Persistence(String),

    #[error("Notification failure: {0}")]
    Notification(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<CoreError> for WorkflowError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ValidationError(msg) => WorkflowError::Validation(msg),
            CoreError::Unauthorized(msg) => WorkflowError::Unauthorized(msg),
        }
    }
}

/// Result of a successful (or no-op) status change
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusOutcome {
    pub agent_id: Uuid,
    pub previous_status: AgentStatus,
    pub status: AgentStatus,
    /// False when the agent was already in the requested state.
    pub changed: bool,
    pub agent_code: Option<String>,
    pub message: String,
}
