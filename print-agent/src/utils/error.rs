//! Unified error handling
//!
//! - [`AppError`] - application error enum, mapped to HTTP status codes
//! - [`AppResponse`] - response envelope
//!
//! # Error codes
//!
//! | Prefix | Category | Example |
//! |--------|----------|---------|
//! | E0xxx | Request/business errors | E0003 not found |
//! | E4xxx | Printer errors | E4001 printer failure |
//! | E9xxx | System errors | E9002 store error |
//!
//! # Example
//!
//! ```ignore
//! // Return an error
//! Err(AppError::NotFound("Job not found".into()))
//!
//! // Return a success envelope
//! Ok(ok(job))
//! ```

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

use crate::printing::{DispatchError, StoreError};

/// API response envelope
///
/// ```json
/// {
///   "code": "E0000",
///   "message": "Success",
///   "data": { ... }
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct AppResponse<T> {
    /// Error code (E0000 on success)
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // ========== Request errors (4xx) ==========
    #[error("Resource not found: {0}")]
    /// 404
    NotFound(String),

    #[error("Conflict: {0}")]
    /// 409
    Conflict(String),

    #[error("Validation failed: {0}")]
    /// 400
    Validation(String),

    #[error("Cannot print: {0}")]
    /// No usable printer for the request (422)
    Precondition(String),

    // ========== Printer errors (5xx) ==========
    #[error("Printer error: {0}")]
    /// Transport failed (502)
    Printer(String),

    #[error("Timed out: {0}")]
    /// Interactive bound exceeded (504)
    Timeout(String),

    // ========== System errors (5xx) ==========
    #[error("Store error: {0}")]
    /// 500
    Database(String),

    #[error("Internal server error: {0}")]
    /// 500
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "E0003", msg.as_str()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "E0004", msg.as_str()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "E0002", msg.as_str()),
            AppError::Precondition(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "E0005", msg.as_str())
            }

            AppError::Printer(msg) => (StatusCode::BAD_GATEWAY, "E4001", msg.as_str()),
            AppError::Timeout(msg) => (StatusCode::GATEWAY_TIMEOUT, "E4002", msg.as_str()),

            AppError::Database(msg) => {
                error!(target: "database", error = %msg, "Store error occurred");
                (StatusCode::INTERNAL_SERVER_ERROR, "E9002", "Store error")
            }
            AppError::Internal(msg) => {
                error!(target: "internal", error = %msg, "Internal error occurred");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "E9001",
                    "Internal server error",
                )
            }
        };

        let body = Json(AppResponse::<()> {
            code: code.to_string(),
            message: message.to_string(),
            data: None,
        });

        (status, body).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => AppError::NotFound(format!("Job {} not found", id)),
            StoreError::PrinterNotFound(id) => {
                AppError::NotFound(format!("Printer {} not found", id))
            }
            StoreError::Terminal { .. } => AppError::Conflict(e.to_string()),
            StoreError::InvalidPrinter(err) => AppError::Validation(err.to_string()),
            other => AppError::Database(other.to_string()),
        }
    }
}

impl From<DispatchError> for AppError {
    fn from(e: DispatchError) -> Self {
        match e {
            DispatchError::Precondition(msg) => AppError::Precondition(msg),
            DispatchError::Encoding(err) => AppError::Validation(err.to_string()),
            DispatchError::Transport(err) => AppError::Printer(err.to_string()),
            DispatchError::Store(err) => err.into(),
        }
    }
}

// ========== Helper functions ==========

/// Create a successful response
pub fn ok<T: Serialize>(data: T) -> Json<AppResponse<T>> {
    Json(AppResponse {
        code: "E0000".to_string(),
        message: "Success".to_string(),
        data: Some(data),
    })
}

/// Create a successful response with custom message
pub fn ok_with_message<T: Serialize>(data: T, message: impl Into<String>) -> Json<AppResponse<T>> {
    Json(AppResponse {
        code: "E0000".to_string(),
        message: message.into(),
        data: Some(data),
    })
}

/// Handler result type
pub type AppResult<T> = Result<T, AppError>;
