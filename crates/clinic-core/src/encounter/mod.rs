//! Encounter state machine.
//!
//! Owns the Waiting → InExamination → Completed/Cancelled lifecycle of a
//! queue entry and its appointment. Each operation runs in one
//! transaction, so the status change and every downstream row succeed or
//! fail together. The clinic-wide one-patient-under-examination rule is
//! enforced through the single-row examination slot, acquired with a
//! conditional write.

use serde::Serialize;

use crate::billing::plan_invoice;
use crate::config::Config;
use crate::db::{clinical, encounters, invoices, Database};
use crate::error::{ClinicError, ClinicResult};
use crate::models::{Appointment, AppointmentStatus, QueueEntry, QueueStatus};
use crate::records::{plan_clinical_records, CompleteExaminationInput};

/// Longest accepted cancellation reason.
pub const MAX_REASON_LEN: usize = 500;

/// Result of starting an examination.
#[derive(Debug, Clone, Serialize)]
pub struct StartedExamination {
    pub queue_id: String,
    pub appointment_id: String,
}

/// Result of completing an examination.
#[derive(Debug, Clone, Serialize)]
pub struct CompletedExamination {
    pub queue_id: String,
    pub appointment_id: String,
    pub invoice_id: String,
    pub total_amount: i64,
}

/// Move a waiting queue entry into examination.
///
/// Fails with `AlreadyInExamination` when any other entry holds the
/// examination slot, and with `InvalidTransition` when the target entry
/// is not `Waiting`.
pub fn start_examination(
    db: &mut Database,
    queue_id: &str,
    acting_staff_id: &str,
) -> ClinicResult<StartedExamination> {
    let tx = db.transaction()?;

    let entry = require_queue_entry(&tx, queue_id)?;
    if entry.status != QueueStatus::Waiting {
        return Err(ClinicError::InvalidTransition {
            current: entry.status.as_str().to_string(),
        });
    }

    if !encounters::try_acquire_examination_slot(&tx, queue_id)? {
        return Err(ClinicError::AlreadyInExamination);
    }

    encounters::update_queue_status(&tx, queue_id, QueueStatus::InExamination, None)?;
    encounters::update_appointment_status(
        &tx,
        &entry.appointment_id,
        AppointmentStatus::InExamination,
        None,
    )?;

    tx.commit()?;

    tracing::info!(queue_id, staff_id = acting_staff_id, "examination started");
    Ok(StartedExamination {
        queue_id: queue_id.to_string(),
        appointment_id: entry.appointment_id,
    })
}

/// Cancel a waiting or in-examination queue entry, recording the reason
/// on both the entry and its appointment.
pub fn cancel_examination(
    db: &mut Database,
    queue_id: &str,
    reason: &str,
    acting_staff_id: &str,
) -> ClinicResult<()> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(ClinicError::validation("reason", "is required"));
    }
    if reason.chars().count() > MAX_REASON_LEN {
        return Err(ClinicError::validation(
            "reason",
            &format!("must be at most {MAX_REASON_LEN} characters"),
        ));
    }

    let tx = db.transaction()?;

    let entry = require_queue_entry(&tx, queue_id)?;
    match entry.status {
        QueueStatus::Waiting | QueueStatus::InExamination => {}
        other => {
            return Err(ClinicError::InvalidTransition {
                current: other.as_str().to_string(),
            });
        }
    }

    // No-op unless this entry holds the slot
    encounters::release_examination_slot(&tx, queue_id)?;
    encounters::update_queue_status(&tx, queue_id, QueueStatus::Cancelled, Some(reason))?;
    encounters::update_appointment_status(
        &tx,
        &entry.appointment_id,
        AppointmentStatus::Cancelled,
        Some(reason),
    )?;

    tx.commit()?;

    tracing::info!(queue_id, staff_id = acting_staff_id, reason, "examination cancelled");
    Ok(())
}

/// Complete an in-examination encounter: materialize its clinical
/// records, derive the invoice, and close the queue entry.
///
/// All-or-nothing: a failure anywhere (unknown medicine, empty invoice,
/// storage error) rolls everything back and the entry stays
/// `InExamination`. A `Completed` entry cannot be completed again.
pub fn complete_examination(
    db: &mut Database,
    queue_id: &str,
    input: &CompleteExaminationInput,
    acting_staff_id: &str,
    config: &Config,
) -> ClinicResult<CompletedExamination> {
    let tx = db.transaction()?;

    let entry = require_queue_entry(&tx, queue_id)?;
    if entry.status != QueueStatus::InExamination {
        return Err(ClinicError::InvalidTransition {
            current: entry.status.as_str().to_string(),
        });
    }

    let mut appointment = require_appointment(&tx, &entry.appointment_id)?;

    // One medical record aggregates all of a patient's encounters;
    // created lazily on first completion
    if appointment.medical_record_id.is_none() {
        let mr_id = encounters::insert_medical_record(&tx, &appointment.patient_id)?;
        encounters::set_appointment_medical_record(&tx, &appointment.id, &mr_id)?;
        appointment.medical_record_id = Some(mr_id);
    }

    let clinical_plan = plan_clinical_records(input, &appointment, &*tx, acting_staff_id)?;
    let invoice_plan = plan_invoice(
        &appointment,
        &clinical_plan,
        &*tx,
        config,
        chrono::Utc::now(),
    )?;

    clinical::upsert_diagnosis(&tx, &clinical_plan.diagnosis)?;
    if let Some((prescription, details)) = &clinical_plan.prescription {
        clinical::insert_prescription(&tx, prescription)?;
        for (detail, _) in details {
            clinical::insert_prescription_detail(&tx, detail)?;
        }
    }

    invoices::insert_invoice(&tx, &invoice_plan.invoice)?;
    for detail in &invoice_plan.details {
        invoices::insert_invoice_detail(&tx, detail)?;
    }
    for (order, _) in &clinical_plan.service_orders {
        let mut order = order.clone();
        order.invoice_id = Some(invoice_plan.invoice.id.clone());
        clinical::insert_service_order(&tx, &order)?;
    }

    encounters::release_examination_slot(&tx, queue_id)?;
    encounters::update_queue_status(&tx, queue_id, QueueStatus::Completed, None)?;
    encounters::update_appointment_status(
        &tx,
        &appointment.id,
        AppointmentStatus::Completed,
        None,
    )?;

    tx.commit()?;

    tracing::info!(
        queue_id,
        invoice_id = %invoice_plan.invoice.id,
        total_amount = invoice_plan.invoice.total_amount,
        staff_id = acting_staff_id,
        "examination completed"
    );
    Ok(CompletedExamination {
        queue_id: queue_id.to_string(),
        appointment_id: appointment.id,
        invoice_id: invoice_plan.invoice.id,
        total_amount: invoice_plan.invoice.total_amount,
    })
}

fn require_queue_entry(conn: &rusqlite::Connection, queue_id: &str) -> ClinicResult<QueueEntry> {
    encounters::get_queue_entry(conn, queue_id)?.ok_or_else(|| ClinicError::NotFound {
        entity: "queue entry",
        id: queue_id.to_string(),
    })
}

fn require_appointment(conn: &rusqlite::Connection, id: &str) -> ClinicResult<Appointment> {
    encounters::get_appointment(conn, id)?.ok_or_else(|| ClinicError::NotFound {
        entity: "appointment",
        id: id.to_string(),
    })
}
