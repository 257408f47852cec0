use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tripdesk_api::{app, AppState, AuthConfig};
use tripdesk_core::notification::NotificationDispatcher;
use tripdesk_core::repository::{AgentRepository, BookingRepository, PaymentRepository, RoleRepository};
use tripdesk_gateway::{EmailSender, HttpEmailDispatcher, HttpIdentityProvider, LogDispatcher};
use tripdesk_onboarding::{AgentStatusWorkflow, WorkflowSettings};
use tripdesk_store::app_config::Config;
use tripdesk_store::{
    DbClient, InMemoryStore, StoreAgentRepository, StoreBookingRepository, StorePaymentRepository,
    StoreRoleRepository,
};

struct Repositories {
    agents: Arc<dyn AgentRepository>,
    bookings: Arc<dyn BookingRepository>,
    payments: Arc<dyn PaymentRepository>,
    roles: Arc<dyn RoleRepository>,
}

async fn repositories(config: &Config) -> anyhow::Result<Repositories> {
    if config.database.in_memory {
        tracing::warn!("Using in-memory storage; records are lost on restart");
        let store = Arc::new(InMemoryStore::new());
        return Ok(Repositories {
            agents: store.clone(),
            bookings: store.clone(),
            payments: store.clone(),
            roles: store,
        });
    }

    let db = DbClient::new(&config.database.url, config.database.max_connections)
        .await
        .context("Failed to connect to Postgres")?;
    db.migrate().await.context("Failed to run migrations")?;

    Ok(Repositories {
        agents: Arc::new(StoreAgentRepository::new(db.pool.clone())),
        bookings: Arc::new(StoreBookingRepository::new(db.pool.clone())),
        payments: Arc::new(StorePaymentRepository::new(db.pool.clone())),
        roles: Arc::new(StoreRoleRepository::new(db.pool)),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "tripdesk_api=debug,tripdesk_onboarding=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting TripDesk API on port {}", config.server.port);

    let repos = repositories(&config).await?;
    let request_timeout = Duration::from_secs(config.gateway.request_timeout_secs);

    let identity = HttpIdentityProvider::new(
        config.identity.base_url.clone(),
        config.identity.service_key.clone(),
        request_timeout,
    )?;

    let notifications = &config.notifications;
    let notifier: Arc<dyn NotificationDispatcher> = if notifications.dry_run {
        tracing::warn!("Notification dry run enabled; emails are logged, not sent");
        Arc::new(LogDispatcher)
    } else {
        Arc::new(HttpEmailDispatcher::new(
            &notifications.base_url,
            notifications.auth_key.clone(),
            EmailSender {
                email: notifications.sender_email.clone(),
                name: notifications.sender_name.clone(),
                domain: notifications.domain.clone(),
            },
            request_timeout,
        )?)
    };

    let workflow = AgentStatusWorkflow::new(
        repos.agents.clone(),
        repos.roles.clone(),
        Arc::new(identity),
        notifier,
        WorkflowSettings {
            templates: notifications.templates.clone(),
            compensation: config.onboarding.compensation,
            deadline: Duration::from_secs(config.onboarding.deadline_secs),
        },
    )?;

    let app_state = AppState {
        agents: repos.agents,
        bookings: repos.bookings,
        payments: repos.payments,
        roles: repos.roles,
        workflow: Arc::new(workflow),
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
        },
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(app_state)).await?;
    Ok(())
}
