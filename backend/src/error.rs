//! Error handling for the PharmaCare backend
//!
//! Every failure carries the constraint it violated and, where numbers are
//! involved, the concrete figures so clients can render an actionable message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication errors
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    // Validation errors
    #[error("Validation error: {message}")]
    Validation { field: String, message: String },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("No prescription lines selected")]
    NoSelection,

    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Ledger errors
    #[error("Insufficient stock for {medicine_name}: requested {requested}, available {available}")]
    InsufficientStock {
        medicine_id: Uuid,
        medicine_name: String,
        requested: i64,
        available: i32,
    },

    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: Decimal, available: Decimal },

    #[error("Prescription {0} has already been fulfilled")]
    AlreadyFulfilled(String),

    #[error("Conflict: {message}")]
    Conflict { resource: String, message: String },

    /// Optimistic version clash or serialization failure inside a unit of work.
    /// Retried by the fulfillment loop; surfaces as `Conflict` when retries run out.
    #[error("Concurrent modification detected")]
    TransactionConflict,

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    /// Transient contention that a fresh attempt may get past
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::TransactionConflict => true,
            AppError::DatabaseError(sqlx::Error::Database(db)) => {
                matches!(db.code().as_deref(), Some("40001") | Some("40P01"))
            }
            _ => false,
        }
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(
            self,
            AppError::DatabaseError(sqlx::Error::Database(db)) if db.code().as_deref() == Some("23505")
        )
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorDetail {
    fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            field: None,
            details: None,
        }
    }

    fn with_field(mut self, field: &str) -> Self {
        self.field = Some(field.to_string());
        self
    }

    fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidCredentials | AppError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Validation { .. } | AppError::ValidationError(_) | AppError::NoSelection => {
                StatusCode::BAD_REQUEST
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InsufficientFunds { .. } => StatusCode::PAYMENT_REQUIRED,
            AppError::InsufficientStock { .. }
            | AppError::AlreadyFulfilled(_)
            | AppError::Conflict { .. }
            | AppError::DuplicateEntry(_)
            | AppError::TransactionConflict => StatusCode::CONFLICT,
            AppError::DatabaseError(_) | AppError::Internal(_) | AppError::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn detail(&self) -> ErrorDetail {
        match self {
            AppError::InvalidCredentials => {
                ErrorDetail::new("INVALID_CREDENTIALS", "Invalid email or password")
            }
            AppError::Unauthorized { message } => ErrorDetail::new("UNAUTHORIZED", message.clone()),
            AppError::Forbidden(message) => ErrorDetail::new("FORBIDDEN", message.clone()),
            AppError::Validation { field, message } => {
                ErrorDetail::new("VALIDATION_ERROR", message.clone()).with_field(field)
            }
            AppError::ValidationError(message) => {
                ErrorDetail::new("VALIDATION_ERROR", message.clone())
            }
            AppError::NoSelection => ErrorDetail::new(
                "NO_SELECTION",
                "Select at least one prescription line to order",
            )
            .with_field("selected_line_indices"),
            AppError::DuplicateEntry(field) => ErrorDetail::new(
                "DUPLICATE_ENTRY",
                format!("A record with this {} already exists", field),
            )
            .with_field(field),
            AppError::NotFound(resource) => {
                ErrorDetail::new("NOT_FOUND", format!("{} not found", resource))
            }
            AppError::InsufficientStock {
                medicine_id,
                medicine_name,
                requested,
                available,
            } => ErrorDetail::new(
                "INSUFFICIENT_STOCK",
                format!(
                    "Insufficient stock for {}: requested {}, available {}",
                    medicine_name, requested, available
                ),
            )
            .with_details(json!({
                "medicine_id": medicine_id,
                "medicine_name": medicine_name,
                "requested": requested,
                "available": available,
            })),
            AppError::InsufficientFunds {
                required,
                available,
            } => ErrorDetail::new(
                "INSUFFICIENT_FUNDS",
                format!(
                    "Insufficient funds: required {}, available {}",
                    required, available
                ),
            )
            .with_details(json!({
                "required": required,
                "available": available,
            })),
            AppError::AlreadyFulfilled(number) => ErrorDetail::new(
                "ALREADY_FULFILLED",
                format!("Prescription {} has already been fulfilled", number),
            ),
            AppError::Conflict { resource, message } => {
                ErrorDetail::new("CONFLICT", message.clone()).with_field(resource)
            }
            AppError::TransactionConflict => ErrorDetail::new(
                "CONFLICT",
                "The request conflicted with a concurrent update, please retry",
            ),
            AppError::DatabaseError(_) => {
                ErrorDetail::new("DATABASE_ERROR", "A database error occurred")
            }
            AppError::Internal(_) | AppError::InternalError(_) => {
                ErrorDetail::new("INTERNAL_ERROR", "An internal server error occurred")
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::debug!("Request failed: {}", self);
        }

        (status, Json(ErrorResponse { error: self.detail() })).into_response()
    }
}

impl From<shared::AmountOverflow> for AppError {
    fn from(err: shared::AmountOverflow) -> Self {
        AppError::validation("total_amount", err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let first = errors
            .field_errors()
            .into_iter()
            .next()
            .map(|(field, errs)| {
                let message = errs
                    .first()
                    .and_then(|e| e.message.as_ref())
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Invalid {}", field));
                (field.to_string(), message)
            });

        match first {
            Some((field, message)) => AppError::Validation { field, message },
            None => AppError::ValidationError(errors.to_string()),
        }
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;
