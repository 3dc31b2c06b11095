//! Payment reconciler.
//!
//! Creates outbound payment attempts against the external gateway and
//! reconciles its asynchronous notifications (IPN callback) and
//! synchronous browser returns against invoice state. Three entry points
//! must agree: create, callback, return. Convergence is achieved by
//! checking the invoice's current status inside the transaction before
//! mutating, so re-delivered or reordered notifications settle on the
//! same final state.

pub mod gateway;
pub mod signature;

pub use gateway::{
    classify_result_code, GatewayCreateResponse, GatewayError, GatewayPaymentRequest,
    PaymentGateway, SandboxGateway, RESULT_SUCCESS,
};
pub use signature::{sign_notification, verify_notification};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::db::{invoices, Database};
use crate::error::{ClinicError, ClinicResult};
use crate::models::InvoiceStatus;

/// Request to open a payment attempt for an invoice.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentRequest {
    pub invoice_id: String,
    pub order_id: String,
    pub amount: i64,
    #[serde(default)]
    pub order_info: String,
    pub payment_method: String,
}

/// Inbound gateway notification (callback or return).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayNotification {
    pub order_id: String,
    pub result_code: i64,
    pub amount: i64,
    #[serde(default)]
    pub trans_id: Option<String>,
    #[serde(default)]
    pub pay_type: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub signature: Option<String>,
}

/// What a reconciliation pass did to the invoice.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// Transitioned to paid on this delivery
    Paid {
        invoice_id: String,
        transaction_id: String,
    },
    /// Already paid; repeated delivery, nothing changed
    AlreadyPaid {
        invoice_id: String,
        transaction_id: Option<String>,
    },
    /// Failure reported; claim released so the customer can retry
    ResetForRetry { invoice_id: String },
    /// No matching claimed invoice (unknown order id, or a failure
    /// already reset it); nothing changed
    Ignored,
}

/// Validate and claim an invoice for one payment attempt, then call the
/// gateway. On gateway rejection or transport failure the claim is
/// rolled back so the invoice stays retryable.
pub fn create_payment(
    db: &mut Database,
    gateway: &dyn PaymentGateway,
    config: &Config,
    request: &CreatePaymentRequest,
) -> ClinicResult<GatewayCreateResponse> {
    if request.order_id.trim().is_empty() {
        return Err(ClinicError::validation("orderId", "is required"));
    }
    if request.payment_method.trim().is_empty() {
        return Err(ClinicError::validation("paymentMethod", "is required"));
    }

    let tx = db.transaction()?;

    let invoice =
        invoices::get_invoice(&tx, &request.invoice_id)?.ok_or_else(|| ClinicError::NotFound {
            entity: "invoice",
            id: request.invoice_id.clone(),
        })?;

    if invoice.status != InvoiceStatus::PendingPayment {
        return Err(ClinicError::InvalidInvoiceStatus {
            status: invoice.status.as_str().to_string(),
        });
    }
    if let Some(existing) = &invoice.order_id {
        if existing != &request.order_id {
            return Err(ClinicError::DuplicatePaymentAttempt {
                order_id: existing.clone(),
            });
        }
    }
    // checked_sub: an extreme requested amount must mismatch, not wrap
    let amount_gap = request
        .amount
        .checked_sub(invoice.total_amount)
        .and_then(i64::checked_abs);
    match amount_gap {
        Some(gap) if gap <= config.amount_tolerance => {}
        _ => {
            return Err(ClinicError::AmountMismatch {
                expected: invoice.total_amount,
                requested: request.amount,
            });
        }
    }

    if !invoices::claim_invoice(
        &tx,
        &request.invoice_id,
        &request.order_id,
        &request.payment_method,
        &Utc::now().to_rfc3339(),
    )? {
        // The conditional UPDATE disagrees with the row read above;
        // refuse rather than call the gateway unclaimed
        return Err(ClinicError::InvalidInvoiceStatus {
            status: invoice.status.as_str().to_string(),
        });
    }
    tx.commit()?;

    // The network call happens outside the transaction; the claim above
    // is what serializes concurrent checkout attempts
    let gateway_request = GatewayPaymentRequest {
        order_id: request.order_id.clone(),
        amount: request.amount,
        order_info: request.order_info.clone(),
        payment_method: request.payment_method.clone(),
    };
    let timeout = std::time::Duration::from_secs(config.gateway_timeout_secs);
    let response = match gateway.create_payment(&gateway_request, timeout) {
        Ok(response) if response.result_code == RESULT_SUCCESS => response,
        Ok(response) => {
            release_claim(db, &request.invoice_id)?;
            return Err(classify_result_code(response.result_code).into());
        }
        Err(err) => {
            release_claim(db, &request.invoice_id)?;
            return Err(err.into());
        }
    };

    tracing::info!(
        invoice_id = %request.invoice_id,
        order_id = %request.order_id,
        amount = request.amount,
        "payment attempt opened"
    );
    Ok(response)
}

/// Reconcile the gateway's asynchronous server-to-server notification.
pub fn handle_callback(
    db: &mut Database,
    config: &Config,
    notification: &GatewayNotification,
) -> ClinicResult<ReconcileOutcome> {
    require_verified(config, notification)?;
    apply_notification(db, notification)
}

/// Reconcile the synchronous browser-redirect notification.
///
/// Same transition logic as the callback, applied independently: the
/// gateway may deliver either, both, or in either order, and both
/// handlers compute the same target state from the same result code.
/// The return leg travels through the customer's browser, so it proves
/// its signature the same way the callback does; an unverifiable
/// notification must never settle an invoice.
pub fn handle_return(
    db: &mut Database,
    config: &Config,
    notification: &GatewayNotification,
) -> ClinicResult<ReconcileOutcome> {
    require_verified(config, notification)?;
    apply_notification(db, notification)
}

fn require_verified(config: &Config, notification: &GatewayNotification) -> ClinicResult<()> {
    let signature = notification
        .signature
        .as_deref()
        .ok_or(ClinicError::InvalidSignature)?;
    if !verify_notification(
        &config.gateway_secret,
        &notification.order_id,
        notification.result_code,
        notification.amount,
        notification.trans_id.as_deref(),
        signature,
    ) {
        return Err(ClinicError::InvalidSignature);
    }
    Ok(())
}

/// Shared state transition for both notification paths.
fn apply_notification(
    db: &mut Database,
    notification: &GatewayNotification,
) -> ClinicResult<ReconcileOutcome> {
    let tx = db.transaction()?;

    let Some(invoice) = invoices::get_invoice_by_order_id(&tx, &notification.order_id)? else {
        // Unknown order id, or a failure notification already reset the
        // claim; either way there is nothing left to apply
        tracing::warn!(order_id = %notification.order_id, "notification matches no claimed invoice");
        return Ok(ReconcileOutcome::Ignored);
    };

    match invoice.status {
        InvoiceStatus::Paid => Ok(ReconcileOutcome::AlreadyPaid {
            invoice_id: invoice.id,
            transaction_id: invoice.transaction_id,
        }),
        InvoiceStatus::Cancelled => Ok(ReconcileOutcome::Ignored),
        InvoiceStatus::PendingPayment => {
            if notification.result_code == RESULT_SUCCESS {
                let transaction_id = notification
                    .trans_id
                    .clone()
                    .unwrap_or_else(|| notification.order_id.clone());
                invoices::mark_invoice_paid(
                    &tx,
                    &invoice.id,
                    &transaction_id,
                    notification.pay_type.as_deref(),
                    &Utc::now().to_rfc3339(),
                )?;
                tx.commit()?;

                tracing::info!(invoice_id = %invoice.id, transaction_id, "invoice settled");
                Ok(ReconcileOutcome::Paid {
                    invoice_id: invoice.id,
                    transaction_id,
                })
            } else {
                invoices::release_invoice_claim(&tx, &invoice.id)?;
                tx.commit()?;

                tracing::info!(
                    invoice_id = %invoice.id,
                    result_code = notification.result_code,
                    "payment failed, claim released for retry"
                );
                Ok(ReconcileOutcome::ResetForRetry {
                    invoice_id: invoice.id,
                })
            }
        }
    }
}

/// Release claimed-but-unsettled invoices older than the configured
/// timeout, unblocking retries after a gateway that never notified.
pub fn reset_stuck_invoices(db: &mut Database, config: &Config) -> ClinicResult<usize> {
    reset_stuck_invoices_at(db, config, Utc::now())
}

/// Sweep implementation with an explicit clock, for tests.
pub fn reset_stuck_invoices_at(
    db: &mut Database,
    config: &Config,
    now: DateTime<Utc>,
) -> ClinicResult<usize> {
    let cutoff = (now - Duration::minutes(config.stuck_payment_timeout_minutes)).to_rfc3339();

    let tx = db.transaction()?;
    let stuck = invoices::list_stuck_invoice_ids(&tx, &cutoff)?;
    for invoice_id in &stuck {
        invoices::release_invoice_claim(&tx, invoice_id)?;
        tracing::warn!(invoice_id, "stuck payment attempt reset");
    }
    tx.commit()?;

    Ok(stuck.len())
}

/// Caller-triggered reset of a single pending invoice's claim.
pub fn manual_reset(db: &mut Database, invoice_id: &str) -> ClinicResult<()> {
    let tx = db.transaction()?;

    let invoice = invoices::get_invoice(&tx, invoice_id)?.ok_or_else(|| ClinicError::NotFound {
        entity: "invoice",
        id: invoice_id.to_string(),
    })?;
    if invoice.status != InvoiceStatus::PendingPayment {
        return Err(ClinicError::InvalidResetAttempt);
    }

    invoices::release_invoice_claim(&tx, invoice_id)?;
    tx.commit()?;

    tracing::info!(invoice_id, "invoice claim manually reset");
    Ok(())
}

fn release_claim(db: &mut Database, invoice_id: &str) -> ClinicResult<()> {
    let tx = db.transaction()?;
    invoices::release_invoice_claim(&tx, invoice_id)?;
    tx.commit()?;
    Ok(())
}
