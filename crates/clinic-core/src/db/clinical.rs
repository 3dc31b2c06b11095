//! Clinical record database operations.

use rusqlite::{params, Connection, OptionalExtension};

use super::{DbError, DbResult};
use crate::models::{
    Diagnosis, Prescription, PrescriptionDetail, ServiceOrder, ServiceOrderStatus,
};

/// Insert or overwrite the diagnosis for an appointment.
pub fn upsert_diagnosis(conn: &Connection, diagnosis: &Diagnosis) -> DbResult<()> {
    conn.execute(
        r#"
        INSERT INTO diagnoses (id, appointment_id, staff_id, symptoms, diagnosis, notes)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        ON CONFLICT(appointment_id) DO UPDATE SET
            staff_id = excluded.staff_id,
            symptoms = excluded.symptoms,
            diagnosis = excluded.diagnosis,
            notes = excluded.notes,
            updated_at = datetime('now')
        "#,
        params![
            diagnosis.id,
            diagnosis.appointment_id,
            diagnosis.staff_id,
            diagnosis.symptoms,
            diagnosis.diagnosis,
            diagnosis.notes,
        ],
    )?;
    Ok(())
}

/// Get the diagnosis for an appointment.
pub fn get_diagnosis(conn: &Connection, appointment_id: &str) -> DbResult<Option<Diagnosis>> {
    Ok(conn
        .query_row(
            r#"
            SELECT id, appointment_id, staff_id, symptoms, diagnosis, notes
            FROM diagnoses
            WHERE appointment_id = ?
            "#,
            [appointment_id],
            |row| {
                Ok(Diagnosis {
                    id: row.get(0)?,
                    appointment_id: row.get(1)?,
                    staff_id: row.get(2)?,
                    symptoms: row.get(3)?,
                    diagnosis: row.get(4)?,
                    notes: row.get(5)?,
                })
            },
        )
        .optional()?)
}

/// Insert a service order.
pub fn insert_service_order(conn: &Connection, order: &ServiceOrder) -> DbResult<()> {
    conn.execute(
        r#"
        INSERT INTO service_orders (
            id, appointment_id, service_id, ordered_by, assigned_to, status, result, invoice_id
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
        params![
            order.id,
            order.appointment_id,
            order.service_id,
            order.ordered_by,
            order.assigned_to,
            order.status.as_str(),
            order.result,
            order.invoice_id,
        ],
    )?;
    Ok(())
}

/// List the service orders for an appointment.
pub fn list_service_orders(conn: &Connection, appointment_id: &str) -> DbResult<Vec<ServiceOrder>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT id, appointment_id, service_id, ordered_by, assigned_to, status, result, invoice_id
        FROM service_orders
        WHERE appointment_id = ?
        ORDER BY created_at, id
        "#,
    )?;

    let rows = stmt.query_map([appointment_id], |row| {
        Ok(ServiceOrderRow {
            id: row.get(0)?,
            appointment_id: row.get(1)?,
            service_id: row.get(2)?,
            ordered_by: row.get(3)?,
            assigned_to: row.get(4)?,
            status: row.get(5)?,
            result: row.get(6)?,
            invoice_id: row.get(7)?,
        })
    })?;

    let mut orders = Vec::new();
    for row in rows {
        orders.push(row?.try_into()?);
    }
    Ok(orders)
}

/// Insert a prescription header.
pub fn insert_prescription(conn: &Connection, prescription: &Prescription) -> DbResult<()> {
    conn.execute(
        r#"
        INSERT INTO prescriptions (id, appointment_id, staff_id, instructions, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
        params![
            prescription.id,
            prescription.appointment_id,
            prescription.staff_id,
            prescription.instructions,
            prescription.created_at,
        ],
    )?;
    Ok(())
}

/// Insert one prescription line.
pub fn insert_prescription_detail(conn: &Connection, detail: &PrescriptionDetail) -> DbResult<()> {
    conn.execute(
        r#"
        INSERT INTO prescription_details (
            id, prescription_id, medicine_id, quantity, dosage, unit_price, total_price
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
        params![
            detail.id,
            detail.prescription_id,
            detail.medicine_id,
            detail.quantity,
            detail.dosage,
            detail.unit_price,
            detail.total_price,
        ],
    )?;
    Ok(())
}

/// Get the prescription for an appointment.
pub fn get_prescription(conn: &Connection, appointment_id: &str) -> DbResult<Option<Prescription>> {
    Ok(conn
        .query_row(
            r#"
            SELECT id, appointment_id, staff_id, instructions, created_at
            FROM prescriptions
            WHERE appointment_id = ?
            "#,
            [appointment_id],
            |row| {
                Ok(Prescription {
                    id: row.get(0)?,
                    appointment_id: row.get(1)?,
                    staff_id: row.get(2)?,
                    instructions: row.get(3)?,
                    created_at: row.get(4)?,
                })
            },
        )
        .optional()?)
}

/// List the lines of a prescription.
pub fn list_prescription_details(
    conn: &Connection,
    prescription_id: &str,
) -> DbResult<Vec<PrescriptionDetail>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT id, prescription_id, medicine_id, quantity, dosage, unit_price, total_price
        FROM prescription_details
        WHERE prescription_id = ?
        ORDER BY id
        "#,
    )?;

    let rows = stmt.query_map([prescription_id], |row| {
        Ok(PrescriptionDetail {
            id: row.get(0)?,
            prescription_id: row.get(1)?,
            medicine_id: row.get(2)?,
            quantity: row.get(3)?,
            dosage: row.get(4)?,
            unit_price: row.get(5)?,
            total_price: row.get(6)?,
        })
    })?;

    let mut details = Vec::new();
    for row in rows {
        details.push(row?);
    }
    Ok(details)
}

struct ServiceOrderRow {
    id: String,
    appointment_id: String,
    service_id: String,
    ordered_by: String,
    assigned_to: String,
    status: String,
    result: Option<String>,
    invoice_id: Option<String>,
}

impl TryFrom<ServiceOrderRow> for ServiceOrder {
    type Error = DbError;

    fn try_from(row: ServiceOrderRow) -> Result<Self, Self::Error> {
        let status = ServiceOrderStatus::parse(&row.status).ok_or_else(|| {
            DbError::Constraint(format!("bad service order status '{}'", row.status))
        })?;
        Ok(ServiceOrder {
            id: row.id,
            appointment_id: row.appointment_id,
            service_id: row.service_id,
            ordered_by: row.ordered_by,
            assigned_to: row.assigned_to,
            status,
            result: row.result,
            invoice_id: row.invoice_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::encounters::insert_appointment;
    use crate::db::Database;
    use crate::models::{Appointment, Service};

    fn setup_db() -> (Database, Appointment) {
        let db = Database::open_in_memory().unwrap();
        let appointment = Appointment::new(
            "patient-1".into(),
            "staff-1".into(),
            "2026-01-05T09:00:00Z".into(),
        );
        insert_appointment(db.conn(), &appointment).unwrap();
        (db, appointment)
    }

    #[test]
    fn test_diagnosis_upsert_overwrites() {
        let (db, appointment) = setup_db();

        let mut diagnosis = Diagnosis {
            id: uuid::Uuid::new_v4().to_string(),
            appointment_id: appointment.id.clone(),
            staff_id: "staff-1".into(),
            symptoms: Some("cough".into()),
            diagnosis: Some("bronchitis".into()),
            notes: None,
        };
        upsert_diagnosis(db.conn(), &diagnosis).unwrap();

        diagnosis.diagnosis = Some("pneumonia".into());
        diagnosis.notes = Some("follow up in a week".into());
        upsert_diagnosis(db.conn(), &diagnosis).unwrap();

        let retrieved = get_diagnosis(db.conn(), &appointment.id).unwrap().unwrap();
        assert_eq!(retrieved.diagnosis.as_deref(), Some("pneumonia"));
        assert_eq!(retrieved.notes.as_deref(), Some("follow up in a week"));

        // Still one row per appointment
        let count: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM diagnoses", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_service_order_roundtrip() {
        let (db, appointment) = setup_db();

        crate::db::catalog::upsert_service(
            db.conn(),
            &Service::new("SVC-1".into(), "X-ray".into(), 150_000),
        )
        .unwrap();

        let order = ServiceOrder::new(appointment.id.clone(), "SVC-1".into(), "staff-1");
        insert_service_order(db.conn(), &order).unwrap();

        let orders = list_service_orders(db.conn(), &appointment.id).unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].service_id, "SVC-1");
        assert_eq!(orders[0].status, ServiceOrderStatus::Ordered);
        assert_eq!(orders[0].ordered_by, "staff-1");
        assert_eq!(orders[0].assigned_to, "staff-1");
    }

    #[test]
    fn test_second_prescription_rejected() {
        let (db, appointment) = setup_db();

        let prescription = Prescription::new(appointment.id.clone(), "staff-1", None);
        insert_prescription(db.conn(), &prescription).unwrap();

        let again = Prescription::new(appointment.id.clone(), "staff-1", None);
        assert!(insert_prescription(db.conn(), &again).is_err());
    }
}
