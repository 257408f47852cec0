use std::sync::Arc;
use tripdesk_core::repository::{AgentRepository, BookingRepository, PaymentRepository, RoleRepository};
use tripdesk_onboarding::AgentStatusWorkflow;
use tripdesk_shared::Masked;

#[derive(Clone)]
pub struct AuthConfig {
    /// HMAC secret the identity provider signs session tokens with
    pub secret: Masked<String>,
}

#[derive(Clone)]
pub struct AppState {
    pub agents: Arc<dyn AgentRepository>,
    pub bookings: Arc<dyn BookingRepository>,
    pub payments: Arc<dyn PaymentRepository>,
    pub roles: Arc<dyn RoleRepository>,
    pub workflow: Arc<AgentStatusWorkflow>,
    pub auth: AuthConfig,
}
