use uuid::Uuid;

/// Emitted once a status transition has been persisted and the agent notified.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct AgentStatusChangedEvent {
    pub agent_id: Uuid,
    pub from_status: String,
    pub to_status: String,
    pub agent_code: Option<String>,
    pub actor_id: String,
    pub timestamp: i64,
}

/// Emitted when a persisted transition was rolled back because the agent could not be notified.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct AgentStatusRevertedEvent {
    pub agent_id: Uuid,
    pub reverted_from: String,
    pub reverted_to: String,
    pub reason: String,
    pub timestamp: i64,
}
