use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use axum_extra::extract::WithRejection;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use tripdesk_core::repository::BOOKING_REFERENCE_CONSTRAINT;
use tripdesk_core::payment::PaymentFilter;
use tripdesk_core::{Booking, CreateBooking, UpdateBooking};

use crate::error::AppError;
use crate::state::AppState;

const MAX_REFERENCE_ATTEMPTS: usize = 3;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/admin/bookings", get(list_bookings).post(create_booking))
        .route(
            "/v1/admin/bookings/{id}",
            get(get_booking).put(update_booking).delete(delete_booking),
        )
}

#[derive(Debug, Deserialize)]
pub struct ListBookingsQuery {
    pub agent_id: Option<Uuid>,
}

pub(crate) async fn ensure_agent_exists(state: &AppState, agent_id: Uuid) -> Result<(), AppError> {
    match state.agents.get(agent_id).await? {
        Some(_) => Ok(()),
        None => Err(AppError::ValidationError(format!("agent {} does not exist", agent_id))),
    }
}

async fn list_bookings(
    State(state): State<AppState>,
    Query(query): Query<ListBookingsQuery>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let bookings = state.bookings.list(query.agent_id).await?;
    Ok(Json(bookings))
}

async fn create_booking(
    State(state): State<AppState>,
    WithRejection(Json(cmd), _): WithRejection<Json<CreateBooking>, AppError>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    ensure_agent_exists(&state, cmd.agent_id).await?;

    let mut attempt = 0;
    loop {
        attempt += 1;
        let reference = state.bookings.generate_reference().await?;
        let booking = Booking::new(reference, cmd.clone())?;

        match state.bookings.insert(&booking).await {
            Ok(()) => {
                info!("Created booking {} for agent {}", booking.booking_reference, booking.agent_id);
                return Ok((StatusCode::CREATED, Json(booking)));
            }
            Err(e) if e.is_conflict_on(BOOKING_REFERENCE_CONSTRAINT) && attempt < MAX_REFERENCE_ATTEMPTS => {
                warn!("Booking reference {} already taken, retrying", booking.booking_reference);
            }
            Err(e) => return Err(e.into()),
        }
    }
}

async fn get_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    let booking = state
        .bookings
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFoundError(format!("booking {} not found", id)))?;
    Ok(Json(booking))
}

async fn update_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    WithRejection(Json(update), _): WithRejection<Json<UpdateBooking>, AppError>,
) -> Result<Json<Booking>, AppError> {
    let mut booking = state
        .bookings
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFoundError(format!("booking {} not found", id)))?;

    if let Some(agent_id) = update.agent_id {
        if agent_id != booking.agent_id {
            ensure_agent_exists(&state, agent_id).await?;

            // Payments stay attributed to the booking's agent
            let filter = PaymentFilter { agent_id: None, booking_id: Some(id) };
            let recorded = state.payments.list(&filter).await?;
            if !recorded.is_empty() {
                return Err(AppError::ConflictError(format!(
                    "booking {} has {} payment(s) recorded for agent {}",
                    id,
                    recorded.len(),
                    booking.agent_id
                )));
            }
        }
    }

    booking.apply(update)?;
    state.bookings.save(&booking).await?;
    Ok(Json(booking))
}

async fn delete_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if state.bookings.delete(id).await? {
        info!("Deleted booking {}", id);
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFoundError(format!("booking {} not found", id)))
    }
}
