use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use axum_extra::extract::WithRejection;
use tracing::info;
use uuid::Uuid;

use tripdesk_core::payment::PaymentFilter;
use tripdesk_core::{CreatePayment, Payment, UpdatePayment};

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/admin/payments", get(list_payments).post(create_payment))
        .route(
            "/v1/admin/payments/{id}",
            get(get_payment).put(update_payment).delete(delete_payment),
        )
}

/// A payment must point at an existing booking made by the same agent.
async fn ensure_booking_of_agent(state: &AppState, booking_id: Uuid, agent_id: Uuid) -> Result<(), AppError> {
    let booking = state
        .bookings
        .get(booking_id)
        .await?
        .ok_or_else(|| AppError::ValidationError(format!("booking {} does not exist", booking_id)))?;

    if booking.agent_id != agent_id {
        return Err(AppError::ValidationError(format!(
            "booking {} does not belong to agent {}",
            booking_id, agent_id
        )));
    }
    Ok(())
}

async fn list_payments(
    State(state): State<AppState>,
    Query(filter): Query<PaymentFilter>,
) -> Result<Json<Vec<Payment>>, AppError> {
    let payments = state.payments.list(&filter).await?;
    Ok(Json(payments))
}

async fn create_payment(
    State(state): State<AppState>,
    WithRejection(Json(cmd), _): WithRejection<Json<CreatePayment>, AppError>,
) -> Result<(StatusCode, Json<Payment>), AppError> {
    ensure_booking_of_agent(&state, cmd.booking_id, cmd.agent_id).await?;

    let payment = Payment::new(cmd)?;
    state.payments.insert(&payment).await?;

    info!("Recorded payment {} against booking {}", payment.id, payment.booking_id);
    Ok((StatusCode::CREATED, Json(payment)))
}

async fn get_payment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Payment>, AppError> {
    let payment = state
        .payments
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFoundError(format!("payment {} not found", id)))?;
    Ok(Json(payment))
}

async fn update_payment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    WithRejection(Json(update), _): WithRejection<Json<UpdatePayment>, AppError>,
) -> Result<Json<Payment>, AppError> {
    let mut payment = state
        .payments
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFoundError(format!("payment {} not found", id)))?;

    let relinked = update.booking_id.is_some() || update.agent_id.is_some();
    payment.apply(update)?;
    if relinked {
        ensure_booking_of_agent(&state, payment.booking_id, payment.agent_id).await?;
    }

    state.payments.save(&payment).await?;
    Ok(Json(payment))
}

async fn delete_payment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if state.payments.delete(id).await? {
        info!("Deleted payment {}", id);
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFoundError(format!("payment {} not found", id)))
    }
}
