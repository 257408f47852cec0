//! Process-local repositories for development mode and tests.
//!
//! Mirrors the Postgres schema's guarantees: the same unique constraints (reported
//! under the same names), foreign keys between agents, bookings and payments, and
//! single-row guarded status updates.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use chrono::Utc;
use rand::thread_rng;
use tokio::sync::RwLock;
use tripdesk_core::credentials::{generate_agent_code, generate_booking_reference};
use tripdesk_core::payment::PaymentFilter;
use tripdesk_core::repository::{
    AgentRepository, BookingRepository, PaymentRepository, RepositoryError, RepositoryResult,
    RoleRepository, AGENT_CODE_CONSTRAINT, AGENT_EMAIL_CONSTRAINT, BOOKING_REFERENCE_CONSTRAINT,
};
use tripdesk_core::{Activation, Agent, AgentStatus, Booking, Payment, Role};
use uuid::Uuid;

const AGENT_USER_CONSTRAINT: &str = "agents_user_id_key";
const BOOKING_AGENT_FK: &str = "bookings_agent_id_fkey";
const PAYMENT_BOOKING_FK: &str = "payments_booking_id_fkey";
const PAYMENT_AGENT_FK: &str = "payments_agent_id_fkey";

#[derive(Default)]
struct Tables {
    agents: HashMap<Uuid, Agent>,
    bookings: HashMap<Uuid, Booking>,
    payments: HashMap<Uuid, Payment>,
    roles: HashMap<Uuid, Vec<Role>>,
    scripted_codes: VecDeque<String>,
    fail_status_writes: bool,
}

impl Tables {
    fn check_agent_unique(&self, agent: &Agent) -> RepositoryResult<()> {
        for other in self.agents.values().filter(|a| a.id != agent.id) {
            if other.email == agent.email {
                return Err(conflict(AGENT_EMAIL_CONSTRAINT));
            }
            if agent.agent_code.is_some() && other.agent_code == agent.agent_code {
                return Err(conflict(AGENT_CODE_CONSTRAINT));
            }
            if agent.user_id.is_some() && other.user_id == agent.user_id {
                return Err(conflict(AGENT_USER_CONSTRAINT));
            }
        }
        Ok(())
    }

    fn check_booking_refs(&self, booking: &Booking) -> RepositoryResult<()> {
        if !self.agents.contains_key(&booking.agent_id) {
            return Err(reference(BOOKING_AGENT_FK));
        }
        let duplicate = self
            .bookings
            .values()
            .any(|b| b.id != booking.id && b.booking_reference == booking.booking_reference);
        if duplicate {
            return Err(conflict(BOOKING_REFERENCE_CONSTRAINT));
        }
        Ok(())
    }

    fn check_payment_refs(&self, payment: &Payment) -> RepositoryResult<()> {
        if !self.bookings.contains_key(&payment.booking_id) {
            return Err(reference(PAYMENT_BOOKING_FK));
        }
        if !self.agents.contains_key(&payment.agent_id) {
            return Err(reference(PAYMENT_AGENT_FK));
        }
        Ok(())
    }

    fn status_write_allowed(&self) -> RepositoryResult<()> {
        if self.fail_status_writes {
            return Err(RepositoryError::Database("connection reset by peer".to_string()));
        }
        Ok(())
    }
}

fn conflict(constraint: &str) -> RepositoryError {
    RepositoryError::Conflict { constraint: constraint.to_string() }
}

fn reference(constraint: &str) -> RepositoryError {
    RepositoryError::ReferenceViolation { constraint: constraint.to_string() }
}

fn newest_first<T, F>(mut items: Vec<T>, created_at: F) -> Vec<T>
where
    F: Fn(&T) -> chrono::DateTime<Utc>,
{
    items.sort_by_key(|item| std::cmp::Reverse(created_at(item)));
    items
}

/// All four repositories over one set of tables.
///
/// Wrap in an `Arc` and coerce to each `Arc<dyn ...Repository>` the caller needs.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(any(test, feature = "test-support"))]
impl InMemoryStore {
    /// Hand out these codes from `generate_agent_code` before random ones, without
    /// checking them against existing agents. Simulates a code race.
    pub async fn script_agent_codes<I>(&self, codes: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.tables.write().await.scripted_codes.extend(codes);
    }

    /// Make `activate` and `transition_status` fail as if the database were unreachable.
    pub async fn fail_status_writes(&self, fail: bool) {
        self.tables.write().await.fail_status_writes = fail;
    }

    /// Overwrite an agent's status directly, bypassing the guards.
    pub async fn force_status(&self, id: Uuid, status: AgentStatus) {
        if let Some(agent) = self.tables.write().await.agents.get_mut(&id) {
            agent.status = status;
        }
    }
}

#[async_trait]
impl AgentRepository for InMemoryStore {
    async fn insert(&self, agent: &Agent) -> RepositoryResult<()> {
        let mut tables = self.tables.write().await;
        if tables.agents.contains_key(&agent.id) {
            return Err(conflict("agents_pkey"));
        }
        tables.check_agent_unique(agent)?;
        tables.agents.insert(agent.id, agent.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> RepositoryResult<Option<Agent>> {
        Ok(self.tables.read().await.agents.get(&id).cloned())
    }

    async fn find_by_user(&self, user_id: Uuid) -> RepositoryResult<Option<Agent>> {
        let tables = self.tables.read().await;
        Ok(tables.agents.values().find(|a| a.user_id == Some(user_id)).cloned())
    }

    async fn list(&self, status: Option<AgentStatus>) -> RepositoryResult<Vec<Agent>> {
        let tables = self.tables.read().await;
        let agents = tables
            .agents
            .values()
            .filter(|a| status.map_or(true, |s| a.status == s))
            .cloned()
            .collect();
        Ok(newest_first(agents, |a: &Agent| a.created_at))
    }

    async fn save_profile(&self, agent: &Agent) -> RepositoryResult<()> {
        let mut tables = self.tables.write().await;
        tables.check_agent_unique(agent)?;

        let stored = tables
            .agents
            .get_mut(&agent.id)
            .ok_or_else(|| RepositoryError::NotFound(format!("agent {}", agent.id)))?;

        stored.company_name = agent.company_name.clone();
        stored.contact_person = agent.contact_person.clone();
        stored.email = agent.email.clone();
        stored.phone = agent.phone.clone();
        stored.address = agent.address.clone();
        stored.trade_licence = agent.trade_licence.clone();
        stored.pan = agent.pan.clone();
        stored.aadhaar = agent.aadhaar.clone();
        stored.commission_rate = agent.commission_rate;
        stored.updated_at = agent.updated_at;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> RepositoryResult<bool> {
        let mut tables = self.tables.write().await;
        if tables.bookings.values().any(|b| b.agent_id == id) {
            return Err(reference(BOOKING_AGENT_FK));
        }
        if tables.payments.values().any(|p| p.agent_id == id) {
            return Err(reference(PAYMENT_AGENT_FK));
        }
        Ok(tables.agents.remove(&id).is_some())
    }

    async fn generate_agent_code(&self) -> RepositoryResult<String> {
        let mut tables = self.tables.write().await;
        if let Some(code) = tables.scripted_codes.pop_front() {
            return Ok(code);
        }

        let mut rng = thread_rng();
        loop {
            let code = generate_agent_code(&mut rng);
            let taken = tables
                .agents
                .values()
                .any(|a| a.agent_code.as_deref() == Some(code.as_str()));
            if !taken {
                return Ok(code);
            }
        }
    }

    async fn activate(
        &self,
        id: Uuid,
        from: AgentStatus,
        activation: &Activation,
    ) -> RepositoryResult<Agent> {
        let mut tables = self.tables.write().await;
        tables.status_write_allowed()?;

        let mut next = match tables.agents.get(&id) {
            Some(agent) if agent.status == from => agent.clone(),
            _ => return Err(RepositoryError::StatusMismatch { agent_id: id, expected: from }),
        };

        next.apply_activation(activation);
        tables.check_agent_unique(&next)?;
        tables.agents.insert(id, next.clone());
        Ok(next)
    }

    async fn transition_status(
        &self,
        id: Uuid,
        from: AgentStatus,
        to: AgentStatus,
    ) -> RepositoryResult<Agent> {
        let mut tables = self.tables.write().await;
        tables.status_write_allowed()?;

        match tables.agents.get_mut(&id) {
            Some(agent) if agent.status == from => {
                agent.status = to;
                agent.updated_at = Utc::now();
                Ok(agent.clone())
            }
            _ => Err(RepositoryError::StatusMismatch { agent_id: id, expected: from }),
        }
    }
}

#[async_trait]
impl BookingRepository for InMemoryStore {
    async fn insert(&self, booking: &Booking) -> RepositoryResult<()> {
        let mut tables = self.tables.write().await;
        tables.check_booking_refs(booking)?;
        tables.bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> RepositoryResult<Option<Booking>> {
        Ok(self.tables.read().await.bookings.get(&id).cloned())
    }

    async fn list(&self, agent_id: Option<Uuid>) -> RepositoryResult<Vec<Booking>> {
        let tables = self.tables.read().await;
        let bookings = tables
            .bookings
            .values()
            .filter(|b| agent_id.map_or(true, |id| b.agent_id == id))
            .cloned()
            .collect();
        Ok(newest_first(bookings, |b: &Booking| b.created_at))
    }

    async fn save(&self, booking: &Booking) -> RepositoryResult<()> {
        let mut tables = self.tables.write().await;
        if !tables.bookings.contains_key(&booking.id) {
            return Err(RepositoryError::NotFound(format!("booking {}", booking.id)));
        }
        tables.check_booking_refs(booking)?;
        tables.bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> RepositoryResult<bool> {
        let mut tables = self.tables.write().await;
        if tables.payments.values().any(|p| p.booking_id == id) {
            return Err(reference(PAYMENT_BOOKING_FK));
        }
        Ok(tables.bookings.remove(&id).is_some())
    }

    async fn generate_reference(&self) -> RepositoryResult<String> {
        let tables = self.tables.read().await;
        let mut rng = thread_rng();
        let today = Utc::now().date_naive();
        loop {
            let reference = generate_booking_reference(&mut rng, today);
            if !tables.bookings.values().any(|b| b.booking_reference == reference) {
                return Ok(reference);
            }
        }
    }
}

#[async_trait]
impl PaymentRepository for InMemoryStore {
    async fn insert(&self, payment: &Payment) -> RepositoryResult<()> {
        let mut tables = self.tables.write().await;
        tables.check_payment_refs(payment)?;
        tables.payments.insert(payment.id, payment.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> RepositoryResult<Option<Payment>> {
        Ok(self.tables.read().await.payments.get(&id).cloned())
    }

    async fn list(&self, filter: &PaymentFilter) -> RepositoryResult<Vec<Payment>> {
        let tables = self.tables.read().await;
        let payments = tables.payments.values().filter(|p| filter.matches(p)).cloned().collect();
        Ok(newest_first(payments, |p: &Payment| p.created_at))
    }

    async fn save(&self, payment: &Payment) -> RepositoryResult<()> {
        let mut tables = self.tables.write().await;
        if !tables.payments.contains_key(&payment.id) {
            return Err(RepositoryError::NotFound(format!("payment {}", payment.id)));
        }
        tables.check_payment_refs(payment)?;
        tables.payments.insert(payment.id, payment.clone());
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> RepositoryResult<bool> {
        Ok(self.tables.write().await.payments.remove(&id).is_some())
    }
}

#[async_trait]
impl RoleRepository for InMemoryStore {
    async fn roles_for(&self, user_id: Uuid) -> RepositoryResult<Vec<Role>> {
        let tables = self.tables.read().await;
        Ok(tables.roles.get(&user_id).cloned().unwrap_or_default())
    }

    async fn assign(&self, user_id: Uuid, role: Role) -> RepositoryResult<()> {
        let mut tables = self.tables.write().await;
        let roles = tables.roles.entry(user_id).or_default();
        if !roles.contains(&role) {
            roles.push(role);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tripdesk_core::{CreateAgent, CreateBooking};
    use tripdesk_shared::Masked;

    fn pending_agent(email: &str) -> Agent {
        let cmd: CreateAgent = serde_json::from_value(serde_json::json!({
            "company_name": "Skyline Tours",
            "contact_person": "Asha Rao",
            "email": email,
            "phone": "9876543210"
        }))
        .unwrap();
        Agent::new_pending(cmd).unwrap()
    }

    fn activation(code: &str) -> Activation {
        Activation {
            agent_code: code.to_string(),
            password: Masked("Xy7!abcdEFGH".to_string()),
            user_id: Uuid::new_v4(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_reports_constraint() {
        let store = InMemoryStore::new();
        AgentRepository::insert(&store, &pending_agent("x@y.com")).await.unwrap();

        let err = AgentRepository::insert(&store, &pending_agent("x@y.com")).await.unwrap_err();
        assert!(err.is_conflict_on(AGENT_EMAIL_CONSTRAINT));
    }

    #[tokio::test]
    async fn test_activation_is_guarded_by_pending() {
        let store = InMemoryStore::new();
        let agent = pending_agent("x@y.com");
        AgentRepository::insert(&store, &agent).await.unwrap();

        let active = store.activate(agent.id, AgentStatus::Pending, &activation("AGT-100001")).await.unwrap();
        assert_eq!(active.status, AgentStatus::Active);
        assert_eq!(active.agent_code.as_deref(), Some("AGT-100001"));

        let err = store.activate(agent.id, AgentStatus::Pending, &activation("AGT-100002")).await.unwrap_err();
        assert!(matches!(err, RepositoryError::StatusMismatch { expected: AgentStatus::Pending, .. }));

        let stored = AgentRepository::get(&store, agent.id).await.unwrap().unwrap();
        assert_eq!(stored.agent_code.as_deref(), Some("AGT-100001"));
    }

    #[tokio::test]
    async fn test_activation_rejects_taken_code() {
        let store = InMemoryStore::new();
        let first = pending_agent("a@y.com");
        let second = pending_agent("b@y.com");
        AgentRepository::insert(&store, &first).await.unwrap();
        AgentRepository::insert(&store, &second).await.unwrap();

        store.activate(first.id, AgentStatus::Pending, &activation("AGT-222222")).await.unwrap();
        let err = store.activate(second.id, AgentStatus::Pending, &activation("AGT-222222")).await.unwrap_err();
        assert!(err.is_conflict_on(AGENT_CODE_CONSTRAINT));

        let stored = AgentRepository::get(&store, second.id).await.unwrap().unwrap();
        assert_eq!(stored.status, AgentStatus::Pending);
    }

    #[tokio::test]
    async fn test_scripted_codes_come_first() {
        let store = InMemoryStore::new();
        store.script_agent_codes(vec!["AGT-333333".to_string()]).await;

        assert_eq!(store.generate_agent_code().await.unwrap(), "AGT-333333");
        let next = store.generate_agent_code().await.unwrap();
        assert!(tripdesk_core::credentials::is_agent_code(&next));
    }

    #[tokio::test]
    async fn test_transition_guard_and_failure_injection() {
        let store = InMemoryStore::new();
        let agent = pending_agent("x@y.com");
        AgentRepository::insert(&store, &agent).await.unwrap();

        let err = store
            .transition_status(agent.id, AgentStatus::Active, AgentStatus::Suspended)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::StatusMismatch { .. }));

        store.fail_status_writes(true).await;
        let err = store
            .transition_status(agent.id, AgentStatus::Pending, AgentStatus::Suspended)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Database(_)));

        store.fail_status_writes(false).await;
        let suspended = store
            .transition_status(agent.id, AgentStatus::Pending, AgentStatus::Suspended)
            .await
            .unwrap();
        assert_eq!(suspended.status, AgentStatus::Suspended);
    }

    #[tokio::test]
    async fn test_booking_requires_agent_and_blocks_agent_delete() {
        let store = InMemoryStore::new();
        let agent = pending_agent("x@y.com");

        let cmd: CreateBooking = serde_json::from_value(serde_json::json!({
            "agent_id": agent.id,
            "booking_type": "bus",
            "passenger_name": "Ravi Kumar",
            "passenger_email": "ravi@example.com",
            "passenger_phone": "9876543210"
        }))
        .unwrap();
        let reference = store.generate_reference().await.unwrap();
        let booking = Booking::new(reference, cmd).unwrap();

        let err = BookingRepository::insert(&store, &booking).await.unwrap_err();
        assert!(matches!(err, RepositoryError::ReferenceViolation { .. }));

        AgentRepository::insert(&store, &agent).await.unwrap();
        BookingRepository::insert(&store, &booking).await.unwrap();

        let err = AgentRepository::delete(&store, agent.id).await.unwrap_err();
        assert!(matches!(err, RepositoryError::ReferenceViolation { .. }));

        assert!(BookingRepository::delete(&store, booking.id).await.unwrap());
        assert!(AgentRepository::delete(&store, agent.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_roles() {
        let store = InMemoryStore::new();
        let user = Uuid::new_v4();

        assert!(store.roles_for(user).await.unwrap().is_empty());
        store.assign(user, Role::Admin).await.unwrap();
        store.assign(user, Role::Admin).await.unwrap();
        assert_eq!(store.roles_for(user).await.unwrap(), vec![Role::Admin]);
    }
}
