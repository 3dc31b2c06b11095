//! Request handlers.
//!
//! Thin wrappers: extract inputs, take the database lock, call the
//! corresponding pipeline operation, map the result. The gateway
//! callback is the one exception to normal error mapping: it always
//! answers 200 with a result code so the gateway knows whether to
//! redeliver.

use std::sync::MutexGuard;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::Redirect;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use clinic_core::payment::{
    self, CreatePaymentRequest, GatewayCreateResponse, GatewayNotification, ReconcileOutcome,
};
use clinic_core::{
    encounter, CompleteExaminationInput, CompletedExamination, Database, StartedExamination,
};

use crate::error::ApiError;
use crate::AppState;

/// Acknowledgement code telling the gateway the notification was
/// processed (successfully or ignored on purpose).
const ACK_OK: i64 = 0;
/// Acknowledgement code telling the gateway to redeliver later.
const ACK_RETRY: i64 = 99;

fn staff_id(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get("x-staff-id")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(String::from)
        .ok_or(ApiError::MissingStaffHeader)
}

fn lock_db(state: &AppState) -> Result<MutexGuard<'_, Database>, ApiError> {
    state.db.lock().map_err(|_| ApiError::Internal("database lock poisoned"))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "ok": true, "message": "clinic API is alive" }))
}

pub async fn start_examination(
    State(state): State<AppState>,
    Path(queue_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<StartedExamination>, ApiError> {
    let staff = staff_id(&headers)?;
    let mut db = lock_db(&state)?;
    let started = encounter::start_examination(&mut db, &queue_id, &staff)?;
    Ok(Json(started))
}

pub async fn complete_examination(
    State(state): State<AppState>,
    Path(queue_id): Path<String>,
    headers: HeaderMap,
    Json(input): Json<CompleteExaminationInput>,
) -> Result<Json<CompletedExamination>, ApiError> {
    let staff = staff_id(&headers)?;
    let mut db = lock_db(&state)?;
    let completed =
        encounter::complete_examination(&mut db, &queue_id, &input, &staff, &state.config)?;
    Ok(Json(completed))
}

#[derive(Debug, Deserialize)]
pub struct CancelBody {
    #[serde(default)]
    pub reason: String,
}

pub async fn cancel_examination(
    State(state): State<AppState>,
    Path(queue_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<CancelBody>,
) -> Result<Json<Value>, ApiError> {
    let staff = staff_id(&headers)?;
    let mut db = lock_db(&state)?;
    encounter::cancel_examination(&mut db, &queue_id, &body.reason, &staff)?;
    Ok(Json(json!({ "queue_id": queue_id, "cancelled": true })))
}

/// Front-desk snapshot of a queue entry and its appointment.
pub async fn get_examination(
    State(state): State<AppState>,
    Path(queue_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let db = lock_db(&state)?;
    let entry = db
        .get_queue_entry(&queue_id)?
        .ok_or_else(|| clinic_core::ClinicError::NotFound {
            entity: "queue entry",
            id: queue_id.clone(),
        })?;
    let appointment = db.get_appointment(&entry.appointment_id)?;
    Ok(Json(json!({ "queue_entry": entry, "appointment": appointment })))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let db = lock_db(&state)?;
    let invoice = db
        .get_invoice(&invoice_id)?
        .ok_or_else(|| clinic_core::ClinicError::NotFound {
            entity: "invoice",
            id: invoice_id.clone(),
        })?;
    let details = db.list_invoice_details(&invoice_id)?;
    Ok(Json(json!({ "invoice": invoice, "details": details })))
}

pub async fn create_payment(
    State(state): State<AppState>,
    Json(request): Json<CreatePaymentRequest>,
) -> Result<Json<GatewayCreateResponse>, ApiError> {
    let mut db = lock_db(&state)?;
    let response = payment::create_payment(&mut db, state.gateway.as_ref(), &state.config, &request)
        .map_err(|err| match err {
            // Checkout must tell the client to retry later, not that the
            // server broke
            clinic_core::ClinicError::Db(err) => {
                tracing::error!(error = %err, "storage unavailable during checkout");
                ApiError::DatabaseUnavailable
            }
            other => ApiError::Clinic(other),
        })?;
    Ok(Json(response))
}

/// Server-to-server gateway notification. Always answers 200: `ACK_OK`
/// when the notification was applied or deliberately ignored, `ACK_RETRY`
/// when processing failed and the gateway should redeliver.
pub async fn payment_callback(
    State(state): State<AppState>,
    Json(notification): Json<GatewayNotification>,
) -> Json<Value> {
    let outcome = match state.db.lock() {
        Ok(mut db) => payment::handle_callback(&mut db, &state.config, &notification),
        Err(_) => {
            tracing::error!("database lock poisoned");
            return Json(json!({ "resultCode": ACK_RETRY }));
        }
    };

    match outcome {
        Ok(outcome) => Json(json!({ "resultCode": ACK_OK, "reconciliation": outcome })),
        Err(err) => {
            tracing::error!(
                order_id = %notification.order_id,
                error = %err,
                "callback processing failed"
            );
            Json(json!({ "resultCode": ACK_RETRY, "message": err.to_string() }))
        }
    }
}

pub async fn payment_return_get(
    State(state): State<AppState>,
    Query(notification): Query<GatewayNotification>,
) -> Redirect {
    payment_return(&state, &notification)
}

pub async fn payment_return_post(
    State(state): State<AppState>,
    Json(notification): Json<GatewayNotification>,
) -> Redirect {
    payment_return(&state, &notification)
}

/// Browser return leg: reconcile, then send the customer to the frontend
/// result page with a coarse status. 303 so the browser re-issues a GET.
fn payment_return(state: &AppState, notification: &GatewayNotification) -> Redirect {
    let outcome = match state.db.lock() {
        Ok(mut db) => payment::handle_return(&mut db, &state.config, notification),
        Err(_) => {
            tracing::error!("database lock poisoned");
            return Redirect::to(&format!("{}?status=error", state.return_url));
        }
    };

    let (status, invoice_id) = match outcome {
        Ok(ReconcileOutcome::Paid { invoice_id, .. })
        | Ok(ReconcileOutcome::AlreadyPaid { invoice_id, .. }) => ("success", Some(invoice_id)),
        Ok(ReconcileOutcome::ResetForRetry { invoice_id }) => ("failed", Some(invoice_id)),
        Ok(ReconcileOutcome::Ignored) => ("unknown", None),
        Err(err) => {
            tracing::error!(order_id = %notification.order_id, error = %err, "return processing failed");
            ("error", None)
        }
    };

    let mut target = format!(
        "{}?status={}&orderId={}",
        state.return_url, status, notification.order_id
    );
    if let Some(invoice_id) = invoice_id {
        target.push_str("&invoiceId=");
        target.push_str(&invoice_id);
    }
    Redirect::to(&target)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetBody {
    pub invoice_id: String,
}

pub async fn reset_payment(
    State(state): State<AppState>,
    Json(body): Json<ResetBody>,
) -> Result<Json<Value>, ApiError> {
    let mut db = lock_db(&state)?;
    payment::manual_reset(&mut db, &body.invoice_id)?;
    Ok(Json(json!({ "invoice_id": body.invoice_id, "reset": true })))
}

pub async fn reset_stuck_payments(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let mut db = lock_db(&state)?;
    let count = payment::reset_stuck_invoices(&mut db, &state.config)?;
    Ok(Json(json!({ "reset": count })))
}
