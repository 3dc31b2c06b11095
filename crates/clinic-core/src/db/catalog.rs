//! Catalog database operations and the lookup seam used by the builders.

use rusqlite::{params, Connection, OptionalExtension};

use super::{Database, DbResult};
use crate::models::{Medicine, Service};

/// Read-only catalog resolution seam.
///
/// The clinical record and invoice builders take `&dyn CatalogLookup` so
/// they can be unit tested against an in-memory catalog without a
/// database.
pub trait CatalogLookup {
    /// Resolve a service by id (inactive services resolve too; billing
    /// snapshots make that safe).
    fn find_service(&self, id: &str) -> DbResult<Option<Service>>;

    /// Resolve a medicine by id.
    fn find_medicine(&self, id: &str) -> DbResult<Option<Medicine>>;

    /// Resolve medicines by exact name. More than one row means the name
    /// is not a unique lookup key.
    fn find_medicines_by_name(&self, name: &str) -> DbResult<Vec<Medicine>>;

    /// Resolve the default examination service for the zero-total
    /// fallback: configured id first, then name pattern, then the first
    /// active catalog entry.
    fn default_examination_service(
        &self,
        configured_id: Option<&str>,
        name_pattern: &str,
    ) -> DbResult<Option<Service>>;
}

impl CatalogLookup for Connection {
    fn find_service(&self, id: &str) -> DbResult<Option<Service>> {
        Ok(self
            .query_row(
                "SELECT id, name, price, active FROM services WHERE id = ?",
                [id],
                service_from_row,
            )
            .optional()?)
    }

    fn find_medicine(&self, id: &str) -> DbResult<Option<Medicine>> {
        Ok(self
            .query_row(
                "SELECT id, name, unit, price, active FROM medicines WHERE id = ?",
                [id],
                medicine_from_row,
            )
            .optional()?)
    }

    fn find_medicines_by_name(&self, name: &str) -> DbResult<Vec<Medicine>> {
        let mut stmt = self.prepare(
            "SELECT id, name, unit, price, active FROM medicines \
             WHERE name = ? AND active = 1 ORDER BY id",
        )?;
        let rows = stmt.query_map([name], medicine_from_row)?;

        let mut medicines = Vec::new();
        for row in rows {
            medicines.push(row?);
        }
        Ok(medicines)
    }

    fn default_examination_service(
        &self,
        configured_id: Option<&str>,
        name_pattern: &str,
    ) -> DbResult<Option<Service>> {
        if let Some(id) = configured_id {
            if let Some(service) = self.find_service(id)? {
                return Ok(Some(service));
            }
        }

        let by_pattern = self
            .query_row(
                "SELECT id, name, price, active FROM services \
                 WHERE active = 1 AND name LIKE '%' || ? || '%' \
                 ORDER BY name LIMIT 1",
                [name_pattern],
                service_from_row,
            )
            .optional()?;
        if by_pattern.is_some() {
            return Ok(by_pattern);
        }

        Ok(self
            .query_row(
                "SELECT id, name, price, active FROM services \
                 WHERE active = 1 ORDER BY name LIMIT 1",
                [],
                service_from_row,
            )
            .optional()?)
    }
}

fn service_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Service> {
    Ok(Service {
        id: row.get(0)?,
        name: row.get(1)?,
        price: row.get(2)?,
        active: row.get(3)?,
    })
}

fn medicine_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Medicine> {
    Ok(Medicine {
        id: row.get(0)?,
        name: row.get(1)?,
        unit: row.get(2)?,
        price: row.get(3)?,
        active: row.get(4)?,
    })
}

/// Insert or update a service (fixture/deployment seeding).
pub fn upsert_service(conn: &Connection, service: &Service) -> DbResult<()> {
    conn.execute(
        r#"
        INSERT INTO services (id, name, price, active, updated_at)
        VALUES (?1, ?2, ?3, ?4, datetime('now'))
        ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            price = excluded.price,
            active = excluded.active,
            updated_at = datetime('now')
        "#,
        params![service.id, service.name, service.price, service.active],
    )?;
    Ok(())
}

/// Insert or update a medicine (fixture/deployment seeding).
pub fn upsert_medicine(conn: &Connection, medicine: &Medicine) -> DbResult<()> {
    conn.execute(
        r#"
        INSERT INTO medicines (id, name, unit, price, active, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, datetime('now'))
        ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            unit = excluded.unit,
            price = excluded.price,
            active = excluded.active,
            updated_at = datetime('now')
        "#,
        params![
            medicine.id,
            medicine.name,
            medicine.unit,
            medicine.price,
            medicine.active
        ],
    )?;
    Ok(())
}

impl Database {
    /// Insert or update a service.
    pub fn upsert_service(&self, service: &Service) -> DbResult<()> {
        upsert_service(&self.conn, service)
    }

    /// Insert or update a medicine.
    pub fn upsert_medicine(&self, medicine: &Medicine) -> DbResult<()> {
        upsert_medicine(&self.conn, medicine)
    }

    /// Get a service by id.
    pub fn get_service(&self, id: &str) -> DbResult<Option<Service>> {
        self.conn.find_service(id)
    }

    /// Get a medicine by id.
    pub fn get_medicine(&self, id: &str) -> DbResult<Option<Medicine>> {
        self.conn.find_medicine(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn test_upsert_and_get_service() {
        let db = setup_db();

        let service = Service::new("SVC-EXAM".into(), "General examination".into(), 50_000);
        db.upsert_service(&service).unwrap();

        let retrieved = db.get_service("SVC-EXAM").unwrap().unwrap();
        assert_eq!(retrieved.name, "General examination");
        assert_eq!(retrieved.price, 50_000);

        let mut updated = service.clone();
        updated.price = 60_000;
        db.upsert_service(&updated).unwrap();
        assert_eq!(db.get_service("SVC-EXAM").unwrap().unwrap().price, 60_000);
    }

    #[test]
    fn test_find_medicines_by_name_unique() {
        let db = setup_db();

        db.upsert_medicine(&Medicine::new("MED-1".into(), "Paracetamol 500mg".into(), 2_000))
            .unwrap();
        db.upsert_medicine(&Medicine::new("MED-2".into(), "Amoxicillin 250mg".into(), 5_000))
            .unwrap();

        let found = db.conn().find_medicines_by_name("Paracetamol 500mg").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "MED-1");

        assert!(db.conn().find_medicines_by_name("Ibuprofen").unwrap().is_empty());
    }

    #[test]
    fn test_find_medicines_by_name_ambiguous() {
        let db = setup_db();

        db.upsert_medicine(&Medicine::new("MED-1".into(), "Paracetamol".into(), 2_000))
            .unwrap();
        db.upsert_medicine(&Medicine::new("MED-2".into(), "Paracetamol".into(), 2_500))
            .unwrap();

        let found = db.conn().find_medicines_by_name("Paracetamol").unwrap();
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn test_default_examination_service_precedence() {
        let db = setup_db();

        db.upsert_service(&Service::new("SVC-A".into(), "Blood panel".into(), 120_000))
            .unwrap();
        db.upsert_service(&Service::new("SVC-B".into(), "General exam".into(), 50_000))
            .unwrap();

        // Configured id wins
        let svc = db
            .conn()
            .default_examination_service(Some("SVC-A"), "exam")
            .unwrap()
            .unwrap();
        assert_eq!(svc.id, "SVC-A");

        // Unknown configured id falls through to the name pattern
        let svc = db
            .conn()
            .default_examination_service(Some("SVC-MISSING"), "exam")
            .unwrap()
            .unwrap();
        assert_eq!(svc.id, "SVC-B");

        // No pattern match falls back to the first active entry
        let svc = db
            .conn()
            .default_examination_service(None, "nonexistent")
            .unwrap()
            .unwrap();
        assert_eq!(svc.id, "SVC-A"); // "Blood panel" sorts first by name

        // Empty catalog resolves to nothing
        let empty = setup_db();
        assert!(empty
            .conn()
            .default_examination_service(None, "exam")
            .unwrap()
            .is_none());
    }
}
