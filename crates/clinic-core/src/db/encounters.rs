//! Queue entry, appointment, and examination-slot database operations.

use rusqlite::{params, Connection, OptionalExtension};

use super::{Database, DbResult};
use crate::models::{Appointment, AppointmentStatus, QueueEntry, QueueStatus};

/// Insert a new appointment (check-in/scheduling write path, used by
/// fixtures and the external scheduling subsystem).
pub fn insert_appointment(conn: &Connection, appointment: &Appointment) -> DbResult<()> {
    conn.execute(
        r#"
        INSERT INTO appointments (
            id, patient_id, staff_id, scheduled_at, status, medical_record_id, cancel_reason
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
        params![
            appointment.id,
            appointment.patient_id,
            appointment.staff_id,
            appointment.scheduled_at,
            appointment.status.as_str(),
            appointment.medical_record_id,
            appointment.cancel_reason,
        ],
    )?;
    Ok(())
}

/// Get an appointment by id.
pub fn get_appointment(conn: &Connection, id: &str) -> DbResult<Option<Appointment>> {
    conn.query_row(
        r#"
        SELECT id, patient_id, staff_id, scheduled_at, status, medical_record_id, cancel_reason
        FROM appointments
        WHERE id = ?
        "#,
        [id],
        |row| {
            Ok(AppointmentRow {
                id: row.get(0)?,
                patient_id: row.get(1)?,
                staff_id: row.get(2)?,
                scheduled_at: row.get(3)?,
                status: row.get(4)?,
                medical_record_id: row.get(5)?,
                cancel_reason: row.get(6)?,
            })
        },
    )
    .optional()?
    .map(|row| row.try_into())
    .transpose()
}

/// Set an appointment's status, recording a cancel reason when given.
pub fn update_appointment_status(
    conn: &Connection,
    id: &str,
    status: AppointmentStatus,
    cancel_reason: Option<&str>,
) -> DbResult<bool> {
    let rows_affected = conn.execute(
        "UPDATE appointments SET status = ?2, cancel_reason = COALESCE(?3, cancel_reason) \
         WHERE id = ?1",
        params![id, status.as_str(), cancel_reason],
    )?;
    Ok(rows_affected > 0)
}

/// Link an appointment to its aggregating medical record.
pub fn set_appointment_medical_record(
    conn: &Connection,
    appointment_id: &str,
    medical_record_id: &str,
) -> DbResult<bool> {
    let rows_affected = conn.execute(
        "UPDATE appointments SET medical_record_id = ?2 WHERE id = ?1",
        params![appointment_id, medical_record_id],
    )?;
    Ok(rows_affected > 0)
}

/// Create a medical record for a patient, returning its id.
pub fn insert_medical_record(conn: &Connection, patient_id: &str) -> DbResult<String> {
    let id = uuid::Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO medical_records (id, patient_id) VALUES (?1, ?2)",
        params![id, patient_id],
    )?;
    Ok(id)
}

/// Insert a new queue entry (check-in write path).
pub fn insert_queue_entry(conn: &Connection, entry: &QueueEntry) -> DbResult<()> {
    conn.execute(
        r#"
        INSERT INTO queue_entries (
            id, appointment_id, status, ticket_number, cancel_reason, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
        params![
            entry.id,
            entry.appointment_id,
            entry.status.as_str(),
            entry.ticket_number,
            entry.cancel_reason,
            entry.created_at,
            entry.updated_at,
        ],
    )?;
    Ok(())
}

/// Get a queue entry by id.
pub fn get_queue_entry(conn: &Connection, id: &str) -> DbResult<Option<QueueEntry>> {
    conn.query_row(
        r#"
        SELECT id, appointment_id, status, ticket_number, cancel_reason, created_at, updated_at
        FROM queue_entries
        WHERE id = ?
        "#,
        [id],
        |row| {
            Ok(QueueEntryRow {
                id: row.get(0)?,
                appointment_id: row.get(1)?,
                status: row.get(2)?,
                ticket_number: row.get(3)?,
                cancel_reason: row.get(4)?,
                created_at: row.get(5)?,
                updated_at: row.get(6)?,
            })
        },
    )
    .optional()?
    .map(|row| row.try_into())
    .transpose()
}

/// Set a queue entry's status, recording a cancel reason when given.
pub fn update_queue_status(
    conn: &Connection,
    id: &str,
    status: QueueStatus,
    cancel_reason: Option<&str>,
) -> DbResult<bool> {
    let rows_affected = conn.execute(
        "UPDATE queue_entries SET status = ?2, cancel_reason = COALESCE(?3, cancel_reason), \
         updated_at = datetime('now') WHERE id = ?1",
        params![id, status.as_str(), cancel_reason],
    )?;
    Ok(rows_affected > 0)
}

/// Try to acquire the clinic-wide examination slot for a queue entry.
///
/// Conditional UPDATE on the single slot row: succeeds only when the slot
/// is free, so two concurrent starts cannot both win.
pub fn try_acquire_examination_slot(conn: &Connection, queue_id: &str) -> DbResult<bool> {
    let rows_affected = conn.execute(
        "UPDATE examination_slot SET queue_id = ?1, acquired_at = datetime('now') \
         WHERE id = 1 AND queue_id IS NULL",
        [queue_id],
    )?;
    Ok(rows_affected > 0)
}

/// Release the examination slot if held by the given queue entry.
pub fn release_examination_slot(conn: &Connection, queue_id: &str) -> DbResult<bool> {
    let rows_affected = conn.execute(
        "UPDATE examination_slot SET queue_id = NULL, acquired_at = NULL \
         WHERE id = 1 AND queue_id = ?1",
        [queue_id],
    )?;
    Ok(rows_affected > 0)
}

/// Queue entry currently holding the examination slot, if any.
pub fn current_examination(conn: &Connection) -> DbResult<Option<String>> {
    Ok(conn.query_row(
        "SELECT queue_id FROM examination_slot WHERE id = 1",
        [],
        |row| row.get(0),
    )?)
}

struct AppointmentRow {
    id: String,
    patient_id: String,
    staff_id: String,
    scheduled_at: String,
    status: String,
    medical_record_id: Option<String>,
    cancel_reason: Option<String>,
}

impl TryFrom<AppointmentRow> for Appointment {
    type Error = super::DbError;

    fn try_from(row: AppointmentRow) -> Result<Self, Self::Error> {
        let status = AppointmentStatus::parse(&row.status).ok_or_else(|| {
            super::DbError::Constraint(format!("bad appointment status '{}'", row.status))
        })?;
        Ok(Appointment {
            id: row.id,
            patient_id: row.patient_id,
            staff_id: row.staff_id,
            scheduled_at: row.scheduled_at,
            status,
            medical_record_id: row.medical_record_id,
            cancel_reason: row.cancel_reason,
        })
    }
}

struct QueueEntryRow {
    id: String,
    appointment_id: String,
    status: String,
    ticket_number: i64,
    cancel_reason: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<QueueEntryRow> for QueueEntry {
    type Error = super::DbError;

    fn try_from(row: QueueEntryRow) -> Result<Self, Self::Error> {
        let status = QueueStatus::parse(&row.status).ok_or_else(|| {
            super::DbError::Constraint(format!("bad queue status '{}'", row.status))
        })?;
        Ok(QueueEntry {
            id: row.id,
            appointment_id: row.appointment_id,
            status,
            ticket_number: row.ticket_number,
            cancel_reason: row.cancel_reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl Database {
    /// Get a queue entry by id.
    pub fn get_queue_entry(&self, id: &str) -> DbResult<Option<QueueEntry>> {
        get_queue_entry(&self.conn, id)
    }

    /// Get an appointment by id.
    pub fn get_appointment(&self, id: &str) -> DbResult<Option<Appointment>> {
        get_appointment(&self.conn, id)
    }

    /// Queue entry currently under examination, if any.
    pub fn current_examination(&self) -> DbResult<Option<String>> {
        current_examination(&self.conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn checked_in(db: &Database) -> QueueEntry {
        let mut appointment = Appointment::new(
            "patient-1".into(),
            "staff-1".into(),
            "2026-01-05T09:00:00Z".into(),
        );
        appointment.status = AppointmentStatus::Waiting;
        insert_appointment(db.conn(), &appointment).unwrap();

        let entry = QueueEntry::new(appointment.id.clone(), 1);
        insert_queue_entry(db.conn(), &entry).unwrap();
        entry
    }

    #[test]
    fn test_queue_entry_roundtrip() {
        let db = setup_db();
        let entry = checked_in(&db);

        let retrieved = db.get_queue_entry(&entry.id).unwrap().unwrap();
        assert_eq!(retrieved.status, QueueStatus::Waiting);
        assert_eq!(retrieved.ticket_number, 1);

        update_queue_status(db.conn(), &entry.id, QueueStatus::Cancelled, Some("left")).unwrap();
        let retrieved = db.get_queue_entry(&entry.id).unwrap().unwrap();
        assert_eq!(retrieved.status, QueueStatus::Cancelled);
        assert_eq!(retrieved.cancel_reason.as_deref(), Some("left"));
    }

    #[test]
    fn test_slot_acquire_release() {
        let db = setup_db();
        let entry_a = checked_in(&db);
        let entry_b = checked_in(&db);

        assert!(try_acquire_examination_slot(db.conn(), &entry_a.id).unwrap());
        // Second acquire loses while the slot is held
        assert!(!try_acquire_examination_slot(db.conn(), &entry_b.id).unwrap());
        assert_eq!(db.current_examination().unwrap().as_deref(), Some(entry_a.id.as_str()));

        // Only the holder can release
        assert!(!release_examination_slot(db.conn(), &entry_b.id).unwrap());
        assert!(release_examination_slot(db.conn(), &entry_a.id).unwrap());
        assert!(db.current_examination().unwrap().is_none());

        assert!(try_acquire_examination_slot(db.conn(), &entry_b.id).unwrap());
    }

    #[test]
    fn test_lazy_medical_record_link() {
        let db = setup_db();
        let entry = checked_in(&db);

        let appointment = db.get_appointment(&entry.appointment_id).unwrap().unwrap();
        assert!(appointment.medical_record_id.is_none());

        let mr_id = insert_medical_record(db.conn(), &appointment.patient_id).unwrap();
        set_appointment_medical_record(db.conn(), &appointment.id, &mr_id).unwrap();

        let appointment = db.get_appointment(&entry.appointment_id).unwrap().unwrap();
        assert_eq!(appointment.medical_record_id.as_deref(), Some(mr_id.as_str()));
    }
}
