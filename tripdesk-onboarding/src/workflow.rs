use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use rand::thread_rng;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use tripdesk_core::credentials::generate_temporary_password;
use tripdesk_core::identity::{IdentityAccount, IdentityError, IdentityProvider};
use tripdesk_core::notification::{
    EmailMessage, NotificationDispatcher, NotificationTemplates, Recipient,
};
use tripdesk_core::policy::{CompensationPolicy, TransitionKind};
use tripdesk_core::repository::{AgentRepository, RepositoryError, RoleRepository, AGENT_CODE_CONSTRAINT};
use tripdesk_core::{Activation, Agent, AgentStatus, RequestContext, SetAgentStatus};
use tripdesk_shared::models::{AgentStatusChangedEvent, AgentStatusRevertedEvent};
use tripdesk_shared::Masked;
use uuid::Uuid;

use crate::error::{StatusOutcome, WorkflowError};
use crate::transition::plan;

/// Attempts at persisting an activation when the generated code collides.
pub const MAX_CODE_ATTEMPTS: usize = 3;

#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    pub templates: NotificationTemplates,
    pub compensation: CompensationPolicy,
    /// Budget for one whole status change, across all external calls.
    pub deadline: Duration,
}

/// The side-effecting step a status change is in; decides how a deadline expiry is reported.
#[derive(Debug, Clone, Copy)]
enum Step {
    Identity,
    Persistence,
    Notification,
}

impl Step {
    fn timed_out(self, deadline: Duration) -> WorkflowError {
        let msg = format!("deadline of {:?} exceeded", deadline);
        match self {
            Step::Identity => WorkflowError::IdentityProvider(msg),
            Step::Persistence => WorkflowError::Persistence(msg),
            Step::Notification => WorkflowError::Notification(msg),
        }
    }
}

fn persistence(err: RepositoryError) -> WorkflowError {
    match err {
        RepositoryError::StatusMismatch { agent_id, expected } => WorkflowError::Persistence(format!(
            "agent {} was changed concurrently and is no longer {}",
            agent_id, expected
        )),
        other => WorkflowError::Persistence(other.to_string()),
    }
}

fn identity(err: IdentityError) -> WorkflowError {
    WorkflowError::IdentityProvider(err.to_string())
}

/// Drives agents through pending → active → suspended, keeping the persisted status,
/// the identity account and the notification email consistent.
///
/// Causal order per change is fixed: identity, then persistence, then notification.
/// A failed notification is compensated by reverting the persisted status when the
/// configured policy asks for it.
pub struct AgentStatusWorkflow {
    agents: Arc<dyn AgentRepository>,
    roles: Arc<dyn RoleRepository>,
    identity: Arc<dyn IdentityProvider>,
    notifier: Arc<dyn NotificationDispatcher>,
    settings: WorkflowSettings,
    in_flight: InFlight,
}

type InFlight = StdMutex<HashMap<Uuid, Arc<Mutex<()>>>>;

/// Exclusive hold on one agent. Releasing it, including when the owning future is
/// dropped mid-flight, removes the agent's entry once nobody else waits on it.
struct AgentLease<'a> {
    in_flight: &'a InFlight,
    agent_id: Uuid,
    lock: Arc<Mutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl AgentLease<'_> {
    async fn acquire(&mut self) {
        self.guard = Some(self.lock.clone().lock_owned().await);
    }
}

impl Drop for AgentLease<'_> {
    fn drop(&mut self) {
        self.guard.take();
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        let idle = in_flight
            .get(&self.agent_id)
            .is_some_and(|lock| Arc::ptr_eq(lock, &self.lock) && Arc::strong_count(lock) == 2);
        if idle {
            in_flight.remove(&self.agent_id);
        }
    }
}

impl AgentStatusWorkflow {
    pub fn new(
        agents: Arc<dyn AgentRepository>,
        roles: Arc<dyn RoleRepository>,
        identity: Arc<dyn IdentityProvider>,
        notifier: Arc<dyn NotificationDispatcher>,
        settings: WorkflowSettings,
    ) -> Result<Self, WorkflowError> {
        let templates = [
            ("approval", &settings.templates.approval),
            ("reactivation", &settings.templates.reactivation),
            ("suspension", &settings.templates.suspension),
        ];
        for (name, id) in templates {
            if id.trim().is_empty() {
                return Err(WorkflowError::Configuration(format!("{} template id is not set", name)));
            }
        }
        if settings.deadline.is_zero() {
            return Err(WorkflowError::Configuration("deadline must be greater than zero".to_string()));
        }

        Ok(Self {
            agents,
            roles,
            identity,
            notifier,
            settings,
            in_flight: StdMutex::new(HashMap::new()),
        })
    }

    /// Move an agent to `cmd.target_status`. Only administrators may call this.
    pub async fn set_agent_status(
        &self,
        ctx: &RequestContext,
        cmd: SetAgentStatus,
    ) -> Result<StatusOutcome, WorkflowError> {
        let admin = ctx.require_admin()?;
        debug!(
            "[{}] {} requests agent {} -> {}",
            ctx.request_id, admin.user_id, cmd.agent_id, cmd.target_status
        );

        let deadline = Instant::now() + self.settings.deadline;
        let mut lease = self.lease(cmd.agent_id);
        lease.acquire().await;
        let result = self.run(ctx, cmd, deadline).await;
        drop(lease);

        match &result {
            Ok(outcome) => info!("[{}] {}", ctx.request_id, outcome.message),
            Err(e) => warn!("[{}] Status change for agent {} failed: {}", ctx.request_id, cmd.agent_id, e),
        }
        result
    }

    async fn run(
        &self,
        ctx: &RequestContext,
        cmd: SetAgentStatus,
        deadline: Instant,
    ) -> Result<StatusOutcome, WorkflowError> {
        let agent = self
            .within(deadline, Step::Persistence, async {
                self.agents.get(cmd.agent_id).await.map_err(persistence)
            })
            .await?
            .ok_or(WorkflowError::NotFound(cmd.agent_id))?;

        let from = agent.status;
        let to = cmd.target_status;
        let kind = match plan(from, to)? {
            Some(kind) => kind,
            None => {
                return Ok(StatusOutcome {
                    agent_id: agent.id,
                    previous_status: from,
                    status: from,
                    changed: false,
                    agent_code: agent.agent_code,
                    message: format!("Agent is already {}", from),
                })
            }
        };

        match kind {
            TransitionKind::Approval => self.approve(ctx, agent, deadline).await,
            // Suspended straight from pending: no credentials exist yet, so this is a first approval
            TransitionKind::Reactivation if !has_credentials(&agent) => {
                info!(
                    "[{}] Agent {} has never been activated; provisioning instead of reactivating",
                    ctx.request_id, agent.id
                );
                self.approve(ctx, agent, deadline).await
            }
            TransitionKind::Reactivation => self.reactivate(ctx, agent, deadline).await,
            TransitionKind::Suspension => self.suspend(ctx, agent, deadline).await,
        }
    }

    // ------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------

    async fn approve(
        &self,
        ctx: &RequestContext,
        agent: Agent,
        deadline: Instant,
    ) -> Result<StatusOutcome, WorkflowError> {
        let from = agent.status;

        // A code left behind by a compensated approval is kept
        let first_code = match agent.agent_code.clone() {
            Some(code) => code,
            None => {
                self.within(deadline, Step::Persistence, async {
                    self.agents.generate_agent_code().await.map_err(persistence)
                })
                .await?
            }
        };
        let password = generate_temporary_password(&mut thread_rng());

        let account = self
            .within(deadline, Step::Identity, self.provision_account(ctx, &agent, &password))
            .await?;

        let activated = self
            .within(
                deadline,
                Step::Persistence,
                self.persist_activation(ctx, agent.id, from, first_code, &password, account.id),
            )
            .await?;
        self.record_change(ctx, &activated, from);

        let code = activated.agent_code.clone().unwrap_or_default();
        let message = EmailMessage::new(recipient(&activated), &self.settings.templates.approval)
            .with_variable("contact_person", activated.contact_person.as_str())
            .with_variable("agent_code", code.as_str())
            .with_variable("password", password.expose().as_str());

        if let Err(err) = self.within(deadline, Step::Notification, self.notify(&message)).await {
            return Err(self.compensate(ctx, &activated, from, TransitionKind::Approval, err).await);
        }

        Ok(StatusOutcome {
            agent_id: activated.id,
            previous_status: from,
            status: activated.status,
            changed: true,
            agent_code: activated.agent_code,
            message: format!("Agent approved with code {}", code),
        })
    }

    async fn reactivate(
        &self,
        ctx: &RequestContext,
        agent: Agent,
        deadline: Instant,
    ) -> Result<StatusOutcome, WorkflowError> {
        let from = agent.status;
        let updated = self
            .within(deadline, Step::Persistence, async {
                self.agents
                    .transition_status(agent.id, from, AgentStatus::Active)
                    .await
                    .map_err(persistence)
            })
            .await?;
        self.record_change(ctx, &updated, from);

        // Stored credentials are re-sent, never regenerated
        let code = updated.agent_code.clone().unwrap_or_default();
        let password = updated.password.as_ref().map(|p| p.expose().as_str()).unwrap_or_default();
        let message = EmailMessage::new(recipient(&updated), &self.settings.templates.reactivation)
            .with_variable("contact_person", updated.contact_person.as_str())
            .with_variable("agent_code", code.as_str())
            .with_variable("password", password);

        if let Err(err) = self.within(deadline, Step::Notification, self.notify(&message)).await {
            return Err(self.compensate(ctx, &updated, from, TransitionKind::Reactivation, err).await);
        }

        Ok(StatusOutcome {
            agent_id: updated.id,
            previous_status: from,
            status: updated.status,
            changed: true,
            agent_code: updated.agent_code,
            message: "Agent reactivated".to_string(),
        })
    }

    async fn suspend(
        &self,
        ctx: &RequestContext,
        agent: Agent,
        deadline: Instant,
    ) -> Result<StatusOutcome, WorkflowError> {
        let from = agent.status;
        let updated = self
            .within(deadline, Step::Persistence, async {
                self.agents
                    .transition_status(agent.id, from, AgentStatus::Suspended)
                    .await
                    .map_err(persistence)
            })
            .await?;
        self.record_change(ctx, &updated, from);

        let message = EmailMessage::new(recipient(&updated), &self.settings.templates.suspension)
            .with_variable("contact_person", updated.contact_person.as_str());

        if let Err(err) = self.within(deadline, Step::Notification, self.notify(&message)).await {
            return Err(self.compensate(ctx, &updated, from, TransitionKind::Suspension, err).await);
        }

        Ok(StatusOutcome {
            agent_id: updated.id,
            previous_status: from,
            status: updated.status,
            changed: true,
            agent_code: updated.agent_code,
            message: "Agent suspended".to_string(),
        })
    }

    // ------------------------------------------------------------------
    // Steps
    // ------------------------------------------------------------------

    /// Create the login account, or take over the one already registered for this email.
    async fn provision_account(
        &self,
        ctx: &RequestContext,
        agent: &Agent,
        password: &Masked<String>,
    ) -> Result<IdentityAccount, WorkflowError> {
        match self.identity.create_account(&agent.email, password, true).await {
            Ok(account) => {
                debug!("[{}] Created identity account {} for agent {}", ctx.request_id, account.id, agent.id);
                Ok(account)
            }
            Err(IdentityError::AlreadyExists(email)) => {
                warn!(
                    "[{}] Identity account for {} already exists; reusing it for agent {}",
                    ctx.request_id, email, agent.id
                );

                let account = self
                    .identity
                    .find_account_by_email(&agent.email)
                    .await
                    .map_err(identity)?
                    .ok_or_else(|| {
                        WorkflowError::IdentityProvider(format!(
                            "account for {} reported as registered but could not be found",
                            agent.email
                        ))
                    })?;

                self.ensure_reusable(ctx, agent, account.id).await?;

                // Another approval may have won while our create call was in flight
                let current = self.agents.get(agent.id).await.map_err(persistence)?;
                if current.map(|a| a.status) != Some(agent.status) {
                    return Err(WorkflowError::Persistence(format!(
                        "agent {} was changed concurrently and is no longer {}",
                        agent.id, agent.status
                    )));
                }

                self.identity.set_password(account.id, password).await.map_err(identity)?;
                info!("[{}] Reset password of existing account {} for agent {}", ctx.request_id, account.id, agent.id);
                Ok(account)
            }
            Err(other) => Err(identity(other)),
        }
    }

    /// An existing account may only be taken over when nothing else already owns it.
    async fn ensure_reusable(
        &self,
        ctx: &RequestContext,
        agent: &Agent,
        account_id: Uuid,
    ) -> Result<(), WorkflowError> {
        let roles = self.roles.roles_for(account_id).await.map_err(persistence)?;
        if !roles.is_empty() {
            error!(
                "[{}] Refusing to reuse account {} for agent {}: it holds role(s) {:?}",
                ctx.request_id, account_id, agent.id, roles
            );
            return Err(WorkflowError::IdentityProvider(format!(
                "{} belongs to an existing staff account and cannot be reused",
                agent.email
            )));
        }

        if let Some(owner) = self.agents.find_by_user(account_id).await.map_err(persistence)? {
            if owner.id != agent.id {
                error!(
                    "[{}] Refusing to reuse account {} for agent {}: already linked to agent {}",
                    ctx.request_id, account_id, agent.id, owner.id
                );
                return Err(WorkflowError::IdentityProvider(format!(
                    "{} belongs to an account already linked to another agent",
                    agent.email
                )));
            }
        }
        Ok(())
    }

    /// Guarded single-row activation; a colliding agent code is regenerated and retried.
    async fn persist_activation(
        &self,
        ctx: &RequestContext,
        agent_id: Uuid,
        from: AgentStatus,
        first_code: String,
        password: &Masked<String>,
        user_id: Uuid,
    ) -> Result<Agent, WorkflowError> {
        let mut activation = Activation {
            agent_code: first_code,
            password: password.clone(),
            user_id,
        };
        let mut attempt = 1;

        loop {
            match self.agents.activate(agent_id, from, &activation).await {
                Ok(agent) => return Ok(agent),
                Err(e) if e.is_conflict_on(AGENT_CODE_CONSTRAINT) && attempt < MAX_CODE_ATTEMPTS => {
                    warn!(
                        "[{}] Agent code {} already taken (attempt {}/{}), regenerating",
                        ctx.request_id, activation.agent_code, attempt, MAX_CODE_ATTEMPTS
                    );
                    activation.agent_code = self.agents.generate_agent_code().await.map_err(persistence)?;
                    attempt += 1;
                }
                Err(e) => {
                    // The identity account stays; a retry reuses it
                    error!(
                        "[{}] Activation of agent {} not persisted after identity account {} was provisioned: {}",
                        ctx.request_id, agent_id, user_id, e
                    );
                    return Err(persistence(e));
                }
            }
        }
    }

    async fn notify(&self, message: &EmailMessage) -> Result<(), WorkflowError> {
        self.notifier
            .send(message)
            .await
            .map_err(|e| WorkflowError::Notification(e.to_string()))
    }

    /// Undo a committed transition after its notification failed, if the policy says so.
    /// Always yields the notification failure, annotated with what happened to the status.
    async fn compensate(
        &self,
        ctx: &RequestContext,
        agent: &Agent,
        revert_to: AgentStatus,
        kind: TransitionKind,
        cause: WorkflowError,
    ) -> WorkflowError {
        let cause = match cause {
            WorkflowError::Notification(msg) => msg,
            other => other.to_string(),
        };

        if !self.settings.compensation.compensates(kind) {
            warn!(
                "[{}] Notification for agent {} failed; status stays {} under {:?}",
                ctx.request_id, agent.id, agent.status, self.settings.compensation
            );
            return WorkflowError::Notification(cause);
        }

        match self.agents.transition_status(agent.id, agent.status, revert_to).await {
            Ok(_) => {
                let event = AgentStatusRevertedEvent {
                    agent_id: agent.id,
                    reverted_from: agent.status.to_string(),
                    reverted_to: revert_to.to_string(),
                    reason: cause.clone(),
                    timestamp: Utc::now().timestamp(),
                };
                info!(
                    "[{}] Agent status reverted: {}",
                    ctx.request_id,
                    serde_json::to_string(&event).unwrap_or_default()
                );
                WorkflowError::Notification(format!("{}; status reverted to {}", cause, revert_to))
            }
            Err(e) => {
                error!(
                    "[{}] Could not revert agent {} from {} to {}: {}",
                    ctx.request_id, agent.id, agent.status, revert_to, e
                );
                WorkflowError::Notification(format!(
                    "{}; reverting status to {} also failed: {}",
                    cause, revert_to, e
                ))
            }
        }
    }

    fn record_change(&self, ctx: &RequestContext, agent: &Agent, from: AgentStatus) {
        let event = AgentStatusChangedEvent {
            agent_id: agent.id,
            from_status: from.to_string(),
            to_status: agent.status.to_string(),
            agent_code: agent.agent_code.clone(),
            actor_id: ctx.actor_id(),
            timestamp: Utc::now().timestamp(),
        };
        info!(
            "[{}] Agent status changed: {}",
            ctx.request_id,
            serde_json::to_string(&event).unwrap_or_default()
        );
    }

    // ------------------------------------------------------------------
    // Plumbing
    // ------------------------------------------------------------------

    async fn within<T, F>(&self, deadline: Instant, step: Step, fut: F) -> Result<T, WorkflowError>
    where
        F: Future<Output = Result<T, WorkflowError>>,
    {
        match tokio::time::timeout_at(deadline, fut).await {
            Ok(result) => result,
            Err(_) => {
                error!("{:?} step exceeded the workflow deadline", step);
                Err(step.timed_out(self.settings.deadline))
            }
        }
    }

    /// Serialize changes to one agent within this process.
    fn lease(&self, agent_id: Uuid) -> AgentLease<'_> {
        let lock = {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            in_flight.entry(agent_id).or_default().clone()
        };
        AgentLease {
            in_flight: &self.in_flight,
            agent_id,
            lock,
            guard: None,
        }
    }
}

fn has_credentials(agent: &Agent) -> bool {
    agent.agent_code.is_some() && agent.password.is_some() && agent.user_id.is_some()
}

fn recipient(agent: &Agent) -> Recipient {
    Recipient {
        email: agent.email.clone(),
        name: agent.contact_person.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tripdesk_core::notification::NotificationTemplates;
    use tripdesk_core::{Caller, CreateAgent, Role};
    use tripdesk_gateway::fakes::{InMemoryIdentityProvider, RecordingDispatcher};
    use tripdesk_store::InMemoryStore;

    fn admin() -> RequestContext {
        RequestContext::for_caller(Caller {
            user_id: Uuid::new_v4(),
            email: None,
            role: Some(Role::Admin),
        })
    }

    async fn setup() -> (AgentStatusWorkflow, Arc<InMemoryIdentityProvider>, Uuid) {
        let store = Arc::new(InMemoryStore::new());
        let identity = Arc::new(InMemoryIdentityProvider::new());
        let workflow = AgentStatusWorkflow::new(
            store.clone(),
            store.clone(),
            identity.clone(),
            Arc::new(RecordingDispatcher::new()),
            WorkflowSettings {
                templates: NotificationTemplates {
                    approval: "11122025_3".to_string(),
                    reactivation: "26122025".to_string(),
                    suspension: "26122025".to_string(),
                },
                compensation: CompensationPolicy::AllTransitions,
                deadline: Duration::from_secs(5),
            },
        )
        .unwrap();

        let cmd: CreateAgent = serde_json::from_value(serde_json::json!({
            "company_name": "Skyline Tours",
            "contact_person": "Asha Rao",
            "email": "x@y.com",
            "phone": "9876543210"
        }))
        .unwrap();
        let agent = Agent::new_pending(cmd).unwrap();
        AgentRepository::insert(store.as_ref(), &agent).await.unwrap();

        (workflow, identity, agent.id)
    }

    fn in_flight_len(workflow: &AgentStatusWorkflow) -> usize {
        workflow.in_flight.lock().unwrap().len()
    }

    #[tokio::test]
    async fn test_lock_entry_released_after_change() {
        let (workflow, _, agent_id) = setup().await;

        let cmd = SetAgentStatus { agent_id, target_status: AgentStatus::Active };
        workflow.set_agent_status(&admin(), cmd).await.unwrap();

        assert_eq!(in_flight_len(&workflow), 0);
    }

    #[tokio::test]
    async fn test_lock_entry_released_when_caller_goes_away() {
        let (workflow, identity, agent_id) = setup().await;
        identity.delay_create(Duration::from_millis(500)).await;

        let ctx = admin();
        let cmd = SetAgentStatus { agent_id, target_status: AgentStatus::Active };
        let abandoned = tokio::time::timeout(
            Duration::from_millis(50),
            workflow.set_agent_status(&ctx, cmd),
        )
        .await;

        assert!(abandoned.is_err());
        assert_eq!(in_flight_len(&workflow), 0);
    }

    #[tokio::test]
    async fn test_waiting_caller_keeps_entry_alive() {
        let (workflow, _, agent_id) = setup().await;

        let mut holder = workflow.lease(agent_id);
        holder.acquire().await;
        let waiter = workflow.lease(agent_id);
        drop(holder);

        assert_eq!(in_flight_len(&workflow), 1);
        drop(waiter);
        assert_eq!(in_flight_len(&workflow), 0);
    }
}
