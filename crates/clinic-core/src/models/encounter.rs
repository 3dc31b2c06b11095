//! Encounter models: the queue entry + appointment pair moving through
//! the examination lifecycle.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a queue entry.
///
/// `Completed` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum QueueStatus {
    /// Checked in, waiting to be called
    Waiting,
    /// Currently under examination (at most one clinic-wide)
    InExamination,
    /// Examination finished, invoice created
    Completed,
    /// Left the queue without completing
    Cancelled,
}

impl QueueStatus {
    /// Stable TEXT encoding used in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStatus::Waiting => "waiting",
            QueueStatus::InExamination => "in_examination",
            QueueStatus::Completed => "completed",
            QueueStatus::Cancelled => "cancelled",
        }
    }

    /// Parse the TEXT encoding.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "waiting" => Some(QueueStatus::Waiting),
            "in_examination" => Some(QueueStatus::InExamination),
            "completed" => Some(QueueStatus::Completed),
            "cancelled" => Some(QueueStatus::Cancelled),
            _ => None,
        }
    }

    /// Whether no further transitions are allowed.
    pub fn is_terminal(&self) -> bool {
        matches!(self, QueueStatus::Completed | QueueStatus::Cancelled)
    }
}

/// Lifecycle status of an appointment.
///
/// Mirrors [`QueueStatus`] once the patient has checked in; `Scheduled`
/// is the pre-check-in state owned by the scheduling subsystem.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AppointmentStatus {
    /// Booked, not yet checked in
    Scheduled,
    /// Checked in, waiting
    Waiting,
    /// Under examination
    InExamination,
    /// Encounter completed
    Completed,
    /// Cancelled
    Cancelled,
}

impl AppointmentStatus {
    /// Stable TEXT encoding used in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Waiting => "waiting",
            AppointmentStatus::InExamination => "in_examination",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }

    /// Parse the TEXT encoding.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "scheduled" => Some(AppointmentStatus::Scheduled),
            "waiting" => Some(AppointmentStatus::Waiting),
            "in_examination" => Some(AppointmentStatus::InExamination),
            "completed" => Some(AppointmentStatus::Completed),
            "cancelled" => Some(AppointmentStatus::Cancelled),
            _ => None,
        }
    }
}

/// One patient's position in today's physical queue.
///
/// Created at check-in (external), mutated only by the encounter state
/// machine, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueueEntry {
    /// Unique queue entry ID
    pub id: String,
    /// Linked appointment
    pub appointment_id: String,
    /// Current lifecycle status
    pub status: QueueStatus,
    /// Position/ticket handed to the patient
    pub ticket_number: i64,
    /// Reason recorded on cancellation
    pub cancel_reason: Option<String>,
    /// Creation timestamp (RFC3339)
    pub created_at: String,
    /// Last update timestamp (RFC3339)
    pub updated_at: String,
}

impl QueueEntry {
    /// Create a new waiting queue entry.
    pub fn new(appointment_id: String, ticket_number: i64) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            appointment_id,
            status: QueueStatus::Waiting,
            ticket_number,
            cancel_reason: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

/// The clinical/administrative booking behind a queue entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    /// Unique appointment ID
    pub id: String,
    /// Patient (externally owned identity)
    pub patient_id: String,
    /// Attending doctor
    pub staff_id: String,
    /// Scheduled date/time (RFC3339)
    pub scheduled_at: String,
    /// Current lifecycle status
    pub status: AppointmentStatus,
    /// Aggregating medical record, created lazily on first completion
    pub medical_record_id: Option<String>,
    /// Reason recorded on cancellation
    pub cancel_reason: Option<String>,
}

impl Appointment {
    /// Create a new scheduled appointment.
    pub fn new(patient_id: String, staff_id: String, scheduled_at: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            patient_id,
            staff_id,
            scheduled_at,
            status: AppointmentStatus::Scheduled,
            medical_record_id: None,
            cancel_reason: None,
        }
    }
}
