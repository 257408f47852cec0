use axum::{extract::State, routing::get, Extension, Json, Router};

use tripdesk_core::payment::PaymentFilter;
use tripdesk_core::{Agent, Booking, Payment, RequestContext};

use crate::error::AppError;
use crate::state::AppState;

/// Self-service views for a signed-in agent.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/agent/me", get(me))
        .route("/v1/agent/me/bookings", get(my_bookings))
        .route("/v1/agent/me/payments", get(my_payments))
}

async fn current_agent(state: &AppState, ctx: &RequestContext) -> Result<Agent, AppError> {
    let caller = ctx.require_agent()?;
    state
        .agents
        .find_by_user(caller.user_id)
        .await?
        .ok_or_else(|| AppError::NotFoundError("no agent profile for this account".to_string()))
}

async fn me(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<Json<Agent>, AppError> {
    let agent = current_agent(&state, &ctx).await?;
    Ok(Json(agent.without_secret()))
}

async fn my_bookings(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let agent = current_agent(&state, &ctx).await?;
    let bookings = state.bookings.list(Some(agent.id)).await?;
    Ok(Json(bookings))
}

async fn my_payments(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<Json<Vec<Payment>>, AppError> {
    let agent = current_agent(&state, &ctx).await?;
    let filter = PaymentFilter {
        agent_id: Some(agent.id),
        booking_id: None,
    };
    let payments = state.payments.list(&filter).await?;
    Ok(Json(payments))
}
