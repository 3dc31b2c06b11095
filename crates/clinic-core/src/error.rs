//! Operation-boundary error taxonomy.
//!
//! Every mutating operation returns one of these; callers at the HTTP
//! boundary map them onto status codes. A failed operation leaves prior
//! state untouched, so retrying the same request is always safe.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::db::DbError;
use crate::payment::GatewayError;

/// Errors surfaced by the settlement pipeline.
#[derive(Error, Debug)]
pub enum ClinicError {
    #[error("validation failed")]
    Validation { errors: BTreeMap<String, String> },

    #[error("invalid transition from status '{current}'")]
    InvalidTransition { current: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("another patient is already under examination")]
    AlreadyInExamination,

    #[error("invoice already claimed by order '{order_id}'")]
    DuplicatePaymentAttempt { order_id: String },

    #[error("requested amount {requested} does not match invoice total {expected}")]
    AmountMismatch { expected: i64, requested: i64 },

    #[error("invoice is not awaiting payment (status '{status}')")]
    InvalidInvoiceStatus { status: String },

    #[error("invoice cannot be reset in its current state")]
    InvalidResetAttempt,

    #[error("unknown medicine: {0}")]
    UnknownMedicine(String),

    #[error("invoice would have no billable lines")]
    EmptyInvoice,

    #[error("no billable service available in the catalog")]
    NoBillableService,

    #[error("notification signature could not be verified")]
    InvalidSignature,

    #[error("payment gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("database error: {0}")]
    Db(#[from] DbError),
}

// Transaction commit/rollback surfaces raw rusqlite errors; route them
// through the storage variant
impl From<rusqlite::Error> for ClinicError {
    fn from(err: rusqlite::Error) -> Self {
        ClinicError::Db(DbError::Sqlite(err))
    }
}

impl ClinicError {
    /// Stable machine-readable code used in HTTP responses.
    pub fn code(&self) -> &'static str {
        match self {
            ClinicError::Validation { .. } => "ValidationFailed",
            ClinicError::InvalidTransition { .. } => "InvalidTransition",
            ClinicError::NotFound { .. } => "NotFound",
            ClinicError::AlreadyInExamination => "AlreadyInExamination",
            ClinicError::DuplicatePaymentAttempt { .. } => "DuplicatePaymentAttempt",
            ClinicError::AmountMismatch { .. } => "AmountMismatch",
            ClinicError::InvalidInvoiceStatus { .. } => "InvalidInvoiceStatus",
            ClinicError::InvalidResetAttempt => "InvalidResetAttempt",
            ClinicError::UnknownMedicine(_) => "UnknownMedicine",
            ClinicError::EmptyInvoice => "EmptyInvoice",
            ClinicError::NoBillableService => "NoBillableService",
            ClinicError::InvalidSignature => "InvalidSignature",
            ClinicError::Gateway(_) => "GatewayError",
            ClinicError::Db(_) => "SystemError",
        }
    }

    /// Convenience constructor for a single-field validation failure.
    pub fn validation(field: &str, message: &str) -> Self {
        let mut errors = BTreeMap::new();
        errors.insert(field.to_string(), message.to_string());
        ClinicError::Validation { errors }
    }
}

pub type ClinicResult<T> = Result<T, ClinicError>;
