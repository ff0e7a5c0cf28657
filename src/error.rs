use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::{DbErr, SqlErr};
use serde_json::json;

use crate::pledge::PledgeError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Payment required: {0}")]
    PaymentRequired(String),
    #[error("Payment gateway error: {0}")]
    Gateway(String),
    #[error("Internal Server Error: {0}")]
    InternalError(String),
}

impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => {
                AppError::Conflict("a record with the same unique value already exists".to_string())
            }
            Some(SqlErr::ForeignKeyConstraintViolation(_)) => {
                AppError::Conflict("the record is still referenced by other records".to_string())
            }
            _ => match err {
                DbErr::RecordNotFound(what) => AppError::NotFound(what),
                other if is_check_violation(&other) => {
                    AppError::Conflict("the change breaks a stored limit".to_string())
                }
                other => AppError::InternalError(other.to_string()),
            },
        }
    }
}

/// SQLite and PostgreSQL both name the constraint kind in the message.
pub(crate) fn is_check_violation(err: &DbErr) -> bool {
    let text = err.to_string();
    text.contains("CHECK constraint") || text.contains("check constraint")
}

impl From<PledgeError> for AppError {
    fn from(err: PledgeError) -> Self {
        match err {
            PledgeError::Validation(msg) => AppError::InvalidRequest(msg),
            PledgeError::NotFound(what) => AppError::NotFound(what.to_string()),
            PledgeError::PaymentNotVerified(msg) => AppError::PaymentRequired(msg),
            PledgeError::Gateway(e) => AppError::Gateway(e.to_string()),
            e @ PledgeError::ConcurrencyConflict(_) => AppError::Conflict(e.to_string()),
            e @ PledgeError::ConstraintViolation(_) => AppError::Conflict(e.to_string()),
            e @ PledgeError::IllegalTransition { .. } => AppError::InvalidRequest(e.to_string()),
            PledgeError::Database(e) => AppError::InternalError(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::InvalidRequest(_) => (StatusCode::UNPROCESSABLE_ENTITY, self.to_string()),
            AppError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, self.to_string()),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, self.to_string()),
            AppError::Conflict(_) => (StatusCode::CONFLICT, self.to_string()),
            AppError::PaymentRequired(_) => (StatusCode::PAYMENT_REQUIRED, self.to_string()),
            AppError::Gateway(detail) => {
                tracing::warn!(%detail, "payment gateway call failed");
                (
                    StatusCode::BAD_GATEWAY,
                    "Payment gateway error: the payment provider could not process the request"
                        .to_string(),
                )
            }
            AppError::InternalError(detail) => {
                tracing::error!(%detail, "request failed with an internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
