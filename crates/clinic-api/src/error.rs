//! HTTP mapping of the pipeline error taxonomy.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use clinic_core::db::DbError;
use clinic_core::ClinicError;
use serde_json::json;

/// Request-level failures, each carrying its HTTP rendering.
#[derive(Debug)]
pub enum ApiError {
    /// A pipeline operation failed
    Clinic(ClinicError),
    /// The `X-Staff-Id` header is absent or empty
    MissingStaffHeader,
    /// Storage failed during checkout; the client should retry later
    DatabaseUnavailable,
    /// Shared state is unusable (poisoned lock)
    Internal(&'static str),
}

impl From<ClinicError> for ApiError {
    fn from(err: ClinicError) -> Self {
        ApiError::Clinic(err)
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        ApiError::Clinic(ClinicError::Db(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::MissingStaffHeader => (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": "MissingStaffHeader",
                    "message": "X-Staff-Id header is required",
                })),
            )
                .into_response(),
            ApiError::DatabaseUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "error": "DatabaseUnavailable",
                    "message": "storage is temporarily unavailable, retry later",
                })),
            )
                .into_response(),
            ApiError::Internal(message) => {
                tracing::error!(message, "request failed");
                system_error().into_response()
            }
            ApiError::Clinic(err) => clinic_response(err),
        }
    }
}

fn clinic_response(err: ClinicError) -> Response {
    match &err {
        ClinicError::Validation { errors } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "error": err.code(),
                "message": err.to_string(),
                "fields": errors,
            })),
        )
            .into_response(),
        ClinicError::NotFound { .. } => {
            (StatusCode::NOT_FOUND, error_body(&err)).into_response()
        }
        ClinicError::Gateway(_) => (StatusCode::BAD_GATEWAY, error_body(&err)).into_response(),
        ClinicError::Db(_) => {
            tracing::error!(error = %err, "request failed");
            system_error().into_response()
        }
        // Transition conflicts and invariant failures: the request was
        // well-formed but cannot be applied to the current state
        _ => (StatusCode::BAD_REQUEST, error_body(&err)).into_response(),
    }
}

fn error_body(err: &ClinicError) -> Json<serde_json::Value> {
    Json(json!({
        "error": err.code(),
        "message": err.to_string(),
    }))
}

// Internal detail never leaves the process
fn system_error() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": "SystemError",
            "message": "internal error",
        })),
    )
}
