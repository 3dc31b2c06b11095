//! External payment gateway seam.
//!
//! The gateway is an external collaborator; the reconciler only depends
//! on this trait.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Gateway result code meaning success.
pub const RESULT_SUCCESS: i64 = 0;
/// Order id already used at the gateway.
pub const RESULT_DUPLICATE_ORDER: i64 = 40;
/// Amount outside the gateway's accepted range.
pub const RESULT_INVALID_AMOUNT: i64 = 41;
/// Gateway is overloaded or the order is still processing.
pub const RESULT_BUSY: i64 = 1000;

/// Failures talking to or reported by the gateway.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    #[error("gateway rejected the amount")]
    InvalidAmount,

    #[error("order id already used at the gateway")]
    DuplicateOrder,

    #[error("gateway is busy, retry later")]
    Busy,

    #[error("gateway rejected the request (code {0})")]
    Rejected(i64),

    #[error("gateway transport failure: {0}")]
    Transport(String),
}

/// Classify a non-success gateway result code.
pub fn classify_result_code(code: i64) -> GatewayError {
    match code {
        RESULT_INVALID_AMOUNT => GatewayError::InvalidAmount,
        RESULT_DUPLICATE_ORDER => GatewayError::DuplicateOrder,
        RESULT_BUSY => GatewayError::Busy,
        other => GatewayError::Rejected(other),
    }
}

/// Outbound create-payment request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayPaymentRequest {
    pub order_id: String,
    pub amount: i64,
    pub order_info: String,
    pub payment_method: String,
}

/// Gateway response to a create-payment request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayCreateResponse {
    pub result_code: i64,
    pub pay_url: Option<String>,
    pub message: Option<String>,
}

/// Outbound payment creation against the external gateway.
pub trait PaymentGateway: Send + Sync {
    /// Open a payment at the gateway. The transport must give up after
    /// `timeout` and surface expiry as [`GatewayError::Transport`],
    /// which rolls the caller's payment claim back.
    fn create_payment(
        &self,
        request: &GatewayPaymentRequest,
        timeout: Duration,
    ) -> Result<GatewayCreateResponse, GatewayError>;
}

/// Deterministic gateway for development and demos: accepts everything
/// and hands back a sandbox pay URL.
pub struct SandboxGateway {
    base_url: String,
}

impl SandboxGateway {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

impl Default for SandboxGateway {
    fn default() -> Self {
        Self::new("https://sandbox.gateway.invalid/pay")
    }
}

impl PaymentGateway for SandboxGateway {
    // No transport involved, nothing to time out
    fn create_payment(
        &self,
        request: &GatewayPaymentRequest,
        _timeout: Duration,
    ) -> Result<GatewayCreateResponse, GatewayError> {
        Ok(GatewayCreateResponse {
            result_code: RESULT_SUCCESS,
            pay_url: Some(format!("{}/{}", self.base_url, request.order_id)),
            message: None,
        })
    }
}
