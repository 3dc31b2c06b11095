//! Invoice database operations, including the payment-claim writes used
//! by the reconciler.

use rusqlite::{params, Connection, OptionalExtension};

use super::{Database, DbError, DbResult};
use crate::models::{Invoice, InvoiceDetail, InvoiceStatus};

/// Insert a new invoice.
pub fn insert_invoice(conn: &Connection, invoice: &Invoice) -> DbResult<()> {
    conn.execute(
        r#"
        INSERT INTO invoices (
            id, patient_id, appointment_id, total_amount, status,
            order_id, payment_method, transaction_id, paid_at, claimed_at, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        "#,
        params![
            invoice.id,
            invoice.patient_id,
            invoice.appointment_id,
            invoice.total_amount,
            invoice.status.as_str(),
            invoice.order_id,
            invoice.payment_method,
            invoice.transaction_id,
            invoice.paid_at,
            invoice.claimed_at,
            invoice.created_at,
        ],
    )?;
    Ok(())
}

/// Insert one invoice line.
pub fn insert_invoice_detail(conn: &Connection, detail: &InvoiceDetail) -> DbResult<()> {
    conn.execute(
        r#"
        INSERT INTO invoice_details (
            id, invoice_id, service_id, medicine_id, description, quantity, unit_price, line_total
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
        params![
            detail.id,
            detail.invoice_id,
            detail.service_id,
            detail.medicine_id,
            detail.description,
            detail.quantity,
            detail.unit_price,
            detail.line_total,
        ],
    )?;
    Ok(())
}

const INVOICE_COLUMNS: &str = "id, patient_id, appointment_id, total_amount, status, \
     order_id, payment_method, transaction_id, paid_at, claimed_at, created_at";

fn invoice_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<InvoiceRow> {
    Ok(InvoiceRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        appointment_id: row.get(2)?,
        total_amount: row.get(3)?,
        status: row.get(4)?,
        order_id: row.get(5)?,
        payment_method: row.get(6)?,
        transaction_id: row.get(7)?,
        paid_at: row.get(8)?,
        claimed_at: row.get(9)?,
        created_at: row.get(10)?,
    })
}

/// Get an invoice by id.
pub fn get_invoice(conn: &Connection, id: &str) -> DbResult<Option<Invoice>> {
    conn.query_row(
        &format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = ?"),
        [id],
        invoice_from_row,
    )
    .optional()?
    .map(|row| row.try_into())
    .transpose()
}

/// Get an invoice by the gateway order id.
pub fn get_invoice_by_order_id(conn: &Connection, order_id: &str) -> DbResult<Option<Invoice>> {
    conn.query_row(
        &format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE order_id = ?"),
        [order_id],
        invoice_from_row,
    )
    .optional()?
    .map(|row| row.try_into())
    .transpose()
}

/// Get the invoice for an appointment.
pub fn get_invoice_by_appointment(
    conn: &Connection,
    appointment_id: &str,
) -> DbResult<Option<Invoice>> {
    conn.query_row(
        &format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE appointment_id = ?"),
        [appointment_id],
        invoice_from_row,
    )
    .optional()?
    .map(|row| row.try_into())
    .transpose()
}

/// List the lines of an invoice.
pub fn list_invoice_details(conn: &Connection, invoice_id: &str) -> DbResult<Vec<InvoiceDetail>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT id, invoice_id, service_id, medicine_id, description, quantity, unit_price, line_total
        FROM invoice_details
        WHERE invoice_id = ?
        ORDER BY id
        "#,
    )?;

    let rows = stmt.query_map([invoice_id], |row| {
        Ok(InvoiceDetail {
            id: row.get(0)?,
            invoice_id: row.get(1)?,
            service_id: row.get(2)?,
            medicine_id: row.get(3)?,
            description: row.get(4)?,
            quantity: row.get(5)?,
            unit_price: row.get(6)?,
            line_total: row.get(7)?,
        })
    })?;

    let mut details = Vec::new();
    for row in rows {
        details.push(row?);
    }
    Ok(details)
}

/// Attach an order id and method to a pending invoice (claim it for one
/// payment attempt). Conditional on the invoice still being pending and
/// either unclaimed or already claimed by the same order id.
pub fn claim_invoice(
    conn: &Connection,
    invoice_id: &str,
    order_id: &str,
    payment_method: &str,
    claimed_at: &str,
) -> DbResult<bool> {
    let rows_affected = conn.execute(
        r#"
        UPDATE invoices
        SET order_id = ?2, payment_method = ?3, claimed_at = ?4
        WHERE id = ?1
          AND status = 'pending_payment'
          AND (order_id IS NULL OR order_id = ?2)
        "#,
        params![invoice_id, order_id, payment_method, claimed_at],
    )?;
    Ok(rows_affected > 0)
}

/// Return a claimed invoice to the unclaimed state so the customer can
/// retry. Paid invoices are never touched.
pub fn release_invoice_claim(conn: &Connection, invoice_id: &str) -> DbResult<bool> {
    let rows_affected = conn.execute(
        r#"
        UPDATE invoices
        SET order_id = NULL, payment_method = NULL, claimed_at = NULL
        WHERE id = ?1 AND status = 'pending_payment'
        "#,
        [invoice_id],
    )?;
    Ok(rows_affected > 0)
}

/// Mark a pending invoice paid, recording the settlement correlation
/// fields. Conditional on the current status, so re-delivered success
/// notifications cannot double-apply.
pub fn mark_invoice_paid(
    conn: &Connection,
    invoice_id: &str,
    transaction_id: &str,
    payment_method: Option<&str>,
    paid_at: &str,
) -> DbResult<bool> {
    let rows_affected = conn.execute(
        r#"
        UPDATE invoices
        SET status = 'paid',
            transaction_id = ?2,
            payment_method = COALESCE(?3, payment_method),
            paid_at = ?4
        WHERE id = ?1 AND status = 'pending_payment'
        "#,
        params![invoice_id, transaction_id, payment_method, paid_at],
    )?;
    Ok(rows_affected > 0)
}

/// Invoice ids claimed before the cutoff and still pending (stuck
/// payment attempts).
pub fn list_stuck_invoice_ids(conn: &Connection, cutoff: &str) -> DbResult<Vec<String>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT id FROM invoices
        WHERE status = 'pending_payment'
          AND order_id IS NOT NULL
          AND claimed_at < ?
        ORDER BY claimed_at
        "#,
    )?;

    let rows = stmt.query_map([cutoff], |row| row.get(0))?;
    let mut ids = Vec::new();
    for row in rows {
        ids.push(row?);
    }
    Ok(ids)
}

struct InvoiceRow {
    id: String,
    patient_id: String,
    appointment_id: String,
    total_amount: i64,
    status: String,
    order_id: Option<String>,
    payment_method: Option<String>,
    transaction_id: Option<String>,
    paid_at: Option<String>,
    claimed_at: Option<String>,
    created_at: String,
}

impl TryFrom<InvoiceRow> for Invoice {
    type Error = DbError;

    fn try_from(row: InvoiceRow) -> Result<Self, Self::Error> {
        let status = InvoiceStatus::parse(&row.status)
            .ok_or_else(|| DbError::Constraint(format!("bad invoice status '{}'", row.status)))?;
        Ok(Invoice {
            id: row.id,
            patient_id: row.patient_id,
            appointment_id: row.appointment_id,
            total_amount: row.total_amount,
            status,
            order_id: row.order_id,
            payment_method: row.payment_method,
            transaction_id: row.transaction_id,
            paid_at: row.paid_at,
            claimed_at: row.claimed_at,
            created_at: row.created_at,
        })
    }
}

impl Database {
    /// Get an invoice by id.
    pub fn get_invoice(&self, id: &str) -> DbResult<Option<Invoice>> {
        get_invoice(&self.conn, id)
    }

    /// Get an invoice by gateway order id.
    pub fn get_invoice_by_order_id(&self, order_id: &str) -> DbResult<Option<Invoice>> {
        get_invoice_by_order_id(&self.conn, order_id)
    }

    /// List the lines of an invoice.
    pub fn list_invoice_details(&self, invoice_id: &str) -> DbResult<Vec<InvoiceDetail>> {
        list_invoice_details(&self.conn, invoice_id)
    }
}
