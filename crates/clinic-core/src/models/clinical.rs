//! Clinical record models produced when an examination completes.

use serde::{Deserialize, Serialize};

/// Free-text clinical findings for one appointment (upsert semantics).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Diagnosis {
    /// Unique diagnosis ID
    pub id: String,
    /// Owning appointment (one diagnosis per appointment)
    pub appointment_id: String,
    /// Authoring staff
    pub staff_id: String,
    /// Reported symptoms
    pub symptoms: Option<String>,
    /// Diagnosis text
    pub diagnosis: Option<String>,
    /// Additional notes / instructions
    pub notes: Option<String>,
}

/// Status of an ordered service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ServiceOrderStatus {
    /// Ordered during examination completion
    Ordered,
    /// Result recorded by the technician workflow (external)
    Completed,
    /// Voided
    Voided,
}

impl ServiceOrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceOrderStatus::Ordered => "ordered",
            ServiceOrderStatus::Completed => "completed",
            ServiceOrderStatus::Voided => "voided",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ordered" => Some(ServiceOrderStatus::Ordered),
            "completed" => Some(ServiceOrderStatus::Completed),
            "voided" => Some(ServiceOrderStatus::Voided),
            _ => None,
        }
    }
}

/// One ordered service for an appointment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceOrder {
    /// Unique order ID
    pub id: String,
    /// Owning appointment
    pub appointment_id: String,
    /// Ordered catalog service
    pub service_id: String,
    /// Staff who placed the order
    pub ordered_by: String,
    /// Staff assigned to perform it
    pub assigned_to: String,
    /// Order status (advanced by an external technician workflow)
    pub status: ServiceOrderStatus,
    /// Result text, once performed
    pub result: Option<String>,
    /// Invoice the order was billed on
    pub invoice_id: Option<String>,
}

impl ServiceOrder {
    /// Create a new order, stamped with the acting staff as both orderer
    /// and assignee.
    pub fn new(appointment_id: String, service_id: String, acting_staff_id: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            appointment_id,
            service_id,
            ordered_by: acting_staff_id.to_string(),
            assigned_to: acting_staff_id.to_string(),
            status: ServiceOrderStatus::Ordered,
            result: None,
            invoice_id: None,
        }
    }
}

/// One prescription per completed encounter. Immutable once created in
/// this pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Prescription {
    /// Unique prescription ID
    pub id: String,
    /// Owning appointment
    pub appointment_id: String,
    /// Prescribing staff
    pub staff_id: String,
    /// Free-text usage instructions
    pub instructions: Option<String>,
    /// Creation timestamp (RFC3339)
    pub created_at: String,
}

impl Prescription {
    pub fn new(appointment_id: String, staff_id: &str, instructions: Option<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            appointment_id,
            staff_id: staff_id.to_string(),
            instructions,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// One prescribed medicine line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PrescriptionDetail {
    /// Unique line ID
    pub id: String,
    /// Owning prescription
    pub prescription_id: String,
    /// Prescribed medicine
    pub medicine_id: String,
    /// Quantity (positive integer)
    pub quantity: i64,
    /// Dosage text ("1 tablet twice daily")
    pub dosage: Option<String>,
    /// Unit price in minor currency units
    pub unit_price: i64,
    /// Line total in minor currency units
    pub total_price: i64,
}
