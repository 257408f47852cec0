use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use axum_extra::extract::WithRejection;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use tripdesk_core::{Agent, AgentStatus, CreateAgent, RequestContext, SetAgentStatus, UpdateAgent};
use tripdesk_onboarding::WorkflowError;

use crate::error::AppError;
use crate::state::AppState;

/// Admin CRUD over agents, mounted behind the admin guard.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/admin/agents", get(list_agents).post(create_agent))
        .route(
            "/v1/admin/agents/{id}",
            get(get_agent).put(update_agent).delete(delete_agent),
        )
}

/// The status endpoint answers unauthorized callers itself, in its own envelope.
pub fn status_routes() -> Router<AppState> {
    Router::new().route("/v1/admin/agents/status", post(set_agent_status))
}

#[derive(Debug, Deserialize)]
pub struct ListAgentsQuery {
    pub status: Option<AgentStatus>,
}

async fn list_agents(
    State(state): State<AppState>,
    Query(query): Query<ListAgentsQuery>,
) -> Result<Json<Vec<Agent>>, AppError> {
    let agents = state.agents.list(query.status).await?;
    Ok(Json(agents))
}

async fn create_agent(
    State(state): State<AppState>,
    WithRejection(Json(cmd), _): WithRejection<Json<CreateAgent>, AppError>,
) -> Result<(StatusCode, Json<Agent>), AppError> {
    let agent = Agent::new_pending(cmd)?;
    state.agents.insert(&agent).await?;

    info!("Registered pending agent {} ({})", agent.id, agent.company_name);
    Ok((StatusCode::CREATED, Json(agent)))
}

async fn get_agent(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Agent>, AppError> {
    let agent = state
        .agents
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFoundError(format!("agent {} not found", id)))?;
    Ok(Json(agent))
}

async fn update_agent(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    WithRejection(Json(update), _): WithRejection<Json<UpdateAgent>, AppError>,
) -> Result<Json<Agent>, AppError> {
    let mut agent = state
        .agents
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFoundError(format!("agent {} not found", id)))?;

    agent.apply(update)?;
    state.agents.save_profile(&agent).await?;
    Ok(Json(agent))
}

async fn delete_agent(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if state.agents.delete(id).await? {
        info!("Deleted agent {}", id);
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFoundError(format!("agent {} not found", id)))
    }
}

// ============================================================================
// Status changes
// ============================================================================

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatusChangeResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_code: Option<String>,
}

impl StatusChangeResponse {
    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            agent_code: None,
        }
    }
}

fn workflow_status(err: &WorkflowError) -> StatusCode {
    match err {
        WorkflowError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        WorkflowError::NotFound(_) => StatusCode::NOT_FOUND,
        WorkflowError::Validation(_) => StatusCode::BAD_REQUEST,
        WorkflowError::IdentityProvider(_) | WorkflowError::Notification(_) => StatusCode::BAD_GATEWAY,
        WorkflowError::Persistence(_) | WorkflowError::Configuration(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

async fn set_agent_status(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    payload: Result<Json<SetAgentStatus>, JsonRejection>,
) -> impl IntoResponse {
    let Json(cmd) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(StatusChangeResponse::failed(rejection.body_text())),
            );
        }
    };

    match state.workflow.set_agent_status(&ctx, cmd).await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(StatusChangeResponse {
                success: true,
                message: Some(outcome.message),
                agent_code: outcome.agent_code,
            }),
        ),
        Err(err) => {
            let status = workflow_status(&err);
            if status == StatusCode::INTERNAL_SERVER_ERROR {
                error!("[{}] status change for agent {} failed: {}", ctx.request_id, cmd.agent_id, err);
                return (status, Json(StatusChangeResponse::failed("Internal Server Error")));
            }
            warn!("[{}] status change for agent {} refused: {}", ctx.request_id, cmd.agent_id, err);
            (status, Json(StatusChangeResponse::failed(err.to_string())))
        }
    }
}
