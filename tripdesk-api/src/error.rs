use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tripdesk_core::repository::{RepositoryError, AGENT_EMAIL_CONSTRAINT, BOOKING_REFERENCE_CONSTRAINT};
use tripdesk_core::CoreError;

#[derive(Debug)]
pub enum AppError {
    AuthenticationError(String),
    AuthorizationError(String),
    ValidationError(String),
    NotFoundError(String),
    ConflictError(String),
    InternalServerError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::AuthorizationError(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::ConflictError(msg) => (StatusCode::CONFLICT, msg),
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ValidationError(msg) => AppError::ValidationError(msg),
            CoreError::Unauthorized(msg) => AppError::AuthenticationError(msg),
        }
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(what) => AppError::NotFoundError(format!("{} not found", what)),
            RepositoryError::Conflict { constraint } if constraint == AGENT_EMAIL_CONSTRAINT => {
                AppError::ValidationError("an agent with this email already exists".to_string())
            }
            RepositoryError::Conflict { constraint } if constraint == BOOKING_REFERENCE_CONSTRAINT => {
                AppError::ConflictError("booking reference already in use".to_string())
            }
            RepositoryError::Conflict { constraint } => {
                AppError::ConflictError(format!("duplicate value violates {}", constraint))
            }
            RepositoryError::ReferenceViolation { constraint } => AppError::ConflictError(format!(
                "record is referenced by, or refers to, a missing record ({})",
                constraint
            )),
            RepositoryError::StatusMismatch { .. } => AppError::ConflictError(err.to_string()),
            RepositoryError::InvalidData(_) | RepositoryError::Database(_) => {
                AppError::InternalServerError(err.to_string())
            }
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::ValidationError(rejection.body_text())
    }
}
