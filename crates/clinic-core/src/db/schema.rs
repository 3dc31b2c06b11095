//! SQLite schema definition.

/// Complete database schema for the settlement pipeline.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Catalog (externally owned reference data, read here for validation/pricing)
-- ============================================================================

CREATE TABLE IF NOT EXISTS services (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    price INTEGER NOT NULL CHECK (price >= 0),
    active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_services_name ON services(name);

CREATE TABLE IF NOT EXISTS medicines (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    unit TEXT,
    price INTEGER NOT NULL CHECK (price >= 0),
    active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_medicines_name ON medicines(name);

-- ============================================================================
-- Encounters
-- ============================================================================

-- One aggregating record per patient, created lazily on first completion
CREATE TABLE IF NOT EXISTS medical_records (
    id TEXT PRIMARY KEY,
    patient_id TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_medical_records_patient ON medical_records(patient_id);

CREATE TABLE IF NOT EXISTS appointments (
    id TEXT PRIMARY KEY,
    patient_id TEXT NOT NULL,
    staff_id TEXT NOT NULL,
    scheduled_at TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'scheduled'
        CHECK (status IN ('scheduled', 'waiting', 'in_examination', 'completed', 'cancelled')),
    medical_record_id TEXT REFERENCES medical_records(id),
    cancel_reason TEXT
);

CREATE INDEX IF NOT EXISTS idx_appointments_patient ON appointments(patient_id);
CREATE INDEX IF NOT EXISTS idx_appointments_status ON appointments(status);

-- Queue entries are historical records: mutated by the state machine,
-- never deleted
CREATE TABLE IF NOT EXISTS queue_entries (
    id TEXT PRIMARY KEY,
    appointment_id TEXT NOT NULL REFERENCES appointments(id),
    status TEXT NOT NULL DEFAULT 'waiting'
        CHECK (status IN ('waiting', 'in_examination', 'completed', 'cancelled')),
    ticket_number INTEGER NOT NULL,
    cancel_reason TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_queue_entries_appointment ON queue_entries(appointment_id);
CREATE INDEX IF NOT EXISTS idx_queue_entries_status ON queue_entries(status);

-- Single-row slot backing the clinic-wide one-patient-under-examination
-- invariant. Acquired/released with conditional UPDATEs.
CREATE TABLE IF NOT EXISTS examination_slot (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    queue_id TEXT REFERENCES queue_entries(id),
    acquired_at TEXT
);

INSERT OR IGNORE INTO examination_slot (id, queue_id, acquired_at)
VALUES (1, NULL, NULL);

-- ============================================================================
-- Clinical records
-- ============================================================================

CREATE TABLE IF NOT EXISTS diagnoses (
    id TEXT PRIMARY KEY,
    appointment_id TEXT NOT NULL UNIQUE REFERENCES appointments(id),
    staff_id TEXT NOT NULL,
    symptoms TEXT,
    diagnosis TEXT,
    notes TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS service_orders (
    id TEXT PRIMARY KEY,
    appointment_id TEXT NOT NULL REFERENCES appointments(id),
    service_id TEXT NOT NULL REFERENCES services(id),
    ordered_by TEXT NOT NULL,
    assigned_to TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'ordered'
        CHECK (status IN ('ordered', 'completed', 'voided')),
    result TEXT,
    invoice_id TEXT REFERENCES invoices(id),
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_service_orders_appointment ON service_orders(appointment_id);

CREATE TABLE IF NOT EXISTS prescriptions (
    id TEXT PRIMARY KEY,
    appointment_id TEXT NOT NULL UNIQUE REFERENCES appointments(id),
    staff_id TEXT NOT NULL,
    instructions TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS prescription_details (
    id TEXT PRIMARY KEY,
    prescription_id TEXT NOT NULL REFERENCES prescriptions(id),
    medicine_id TEXT NOT NULL REFERENCES medicines(id),
    quantity INTEGER NOT NULL CHECK (quantity > 0),
    dosage TEXT,
    unit_price INTEGER NOT NULL CHECK (unit_price >= 0),
    total_price INTEGER NOT NULL CHECK (total_price >= 0)
);

CREATE INDEX IF NOT EXISTS idx_prescription_details_prescription
    ON prescription_details(prescription_id);

-- ============================================================================
-- Invoices
-- ============================================================================

CREATE TABLE IF NOT EXISTS invoices (
    id TEXT PRIMARY KEY,
    patient_id TEXT NOT NULL,
    appointment_id TEXT NOT NULL UNIQUE REFERENCES appointments(id),
    total_amount INTEGER NOT NULL CHECK (total_amount >= 0),
    status TEXT NOT NULL DEFAULT 'pending_payment'
        CHECK (status IN ('pending_payment', 'paid', 'cancelled')),
    order_id TEXT,
    payment_method TEXT,
    transaction_id TEXT,
    paid_at TEXT,
    claimed_at TEXT,
    created_at TEXT NOT NULL
);

-- The gateway only knows the order id; inbound notifications look up by it
CREATE UNIQUE INDEX IF NOT EXISTS idx_invoices_order_id
    ON invoices(order_id) WHERE order_id IS NOT NULL;
CREATE INDEX IF NOT EXISTS idx_invoices_status ON invoices(status);

-- Every line references at most one catalog item, never zero
CREATE TABLE IF NOT EXISTS invoice_details (
    id TEXT PRIMARY KEY,
    invoice_id TEXT NOT NULL REFERENCES invoices(id),
    service_id TEXT REFERENCES services(id),
    medicine_id TEXT REFERENCES medicines(id),
    description TEXT NOT NULL,
    quantity INTEGER NOT NULL CHECK (quantity > 0),
    unit_price INTEGER NOT NULL CHECK (unit_price >= 0),
    line_total INTEGER NOT NULL CHECK (line_total >= 0),
    CHECK (service_id IS NOT NULL OR medicine_id IS NOT NULL),
    CHECK (service_id IS NULL OR medicine_id IS NULL)
);

CREATE INDEX IF NOT EXISTS idx_invoice_details_invoice ON invoice_details(invoice_id);
"#;
