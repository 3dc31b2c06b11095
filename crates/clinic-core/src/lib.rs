//! Clinic Settlement Core
//!
//! Clinical-encounter-to-settlement pipeline for a clinic operations
//! backend.
//!
//! # Architecture
//!
//! ```text
//! Check-in (external) → Queue entry [Waiting]
//!                             │ StartExamination  (clinic-wide slot)
//!                             ▼
//!                       [InExamination]
//!                             │ CompleteExamination
//!              ┌──────────────▼──────────────┐
//!              │     one atomic transaction  │
//!              │  Diagnosis / ServiceOrders  │
//!              │  Prescription (+ details)   │
//!              │  Invoice (+ details)        │
//!              └──────────────┬──────────────┘
//!                             ▼
//!                        [Completed]          Invoice [PendingPayment]
//!                                                     │ CreatePayment
//!                                                     ▼
//!                                             claimed (order id set)
//!                                              │ callback │ return
//!                                              ▼          ▼
//!                                            [Paid]  or reset for retry
//! ```
//!
//! # Core invariants
//!
//! - At most one queue entry clinic-wide is `InExamination` at a time.
//! - Every invoice has at least one line, and its total equals the sum
//!   of its line totals.
//! - A payment success is applied at most once; repeated or reordered
//!   gateway notifications converge on the same final state.
//!
//! # Modules
//!
//! - [`db`]: SQLite storage layer
//! - [`models`]: domain types (QueueEntry, Appointment, Invoice, ...)
//! - [`encounter`]: examination lifecycle state machine
//! - [`records`]: clinical record builder (pure planning)
//! - [`billing`]: invoice builder (pure planning)
//! - [`payment`]: payment reconciler + gateway seam

pub mod billing;
pub mod config;
pub mod db;
pub mod encounter;
pub mod error;
pub mod models;
pub mod payment;
pub mod records;

#[cfg(test)]
pub(crate) mod testutil;

// Re-export commonly used types
pub use config::Config;
pub use db::Database;
pub use encounter::{
    cancel_examination, complete_examination, start_examination, CompletedExamination,
    StartedExamination,
};
pub use error::{ClinicError, ClinicResult};
pub use models::{
    Appointment, AppointmentStatus, Diagnosis, Invoice, InvoiceDetail, InvoiceStatus, Medicine,
    Prescription, PrescriptionDetail, QueueEntry, QueueStatus, Service, ServiceOrder,
    ServiceOrderStatus,
};
pub use payment::{
    create_payment, handle_callback, handle_return, manual_reset, reset_stuck_invoices,
    CreatePaymentRequest, GatewayNotification, PaymentGateway, ReconcileOutcome, SandboxGateway,
};
pub use records::{CompleteExaminationInput, PrescriptionLineInput};
