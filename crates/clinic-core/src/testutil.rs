//! Shared fixtures for unit tests.

use crate::db::{CatalogLookup, DbResult};
use crate::models::{Medicine, Service};

/// In-memory catalog for builder tests; no database required.
pub(crate) struct StaticCatalog {
    pub services: Vec<Service>,
    pub medicines: Vec<Medicine>,
}

impl CatalogLookup for StaticCatalog {
    fn find_service(&self, id: &str) -> DbResult<Option<Service>> {
        Ok(self.services.iter().find(|s| s.id == id).cloned())
    }

    fn find_medicine(&self, id: &str) -> DbResult<Option<Medicine>> {
        Ok(self.medicines.iter().find(|m| m.id == id).cloned())
    }

    fn find_medicines_by_name(&self, name: &str) -> DbResult<Vec<Medicine>> {
        Ok(self
            .medicines
            .iter()
            .filter(|m| m.name == name && m.active)
            .cloned()
            .collect())
    }

    fn default_examination_service(
        &self,
        configured_id: Option<&str>,
        name_pattern: &str,
    ) -> DbResult<Option<Service>> {
        if let Some(id) = configured_id {
            if let Some(s) = self.services.iter().find(|s| s.id == id) {
                return Ok(Some(s.clone()));
            }
        }
        if let Some(s) = self
            .services
            .iter()
            .find(|s| s.active && s.name.to_lowercase().contains(&name_pattern.to_lowercase()))
        {
            return Ok(Some(s.clone()));
        }
        Ok(self.services.iter().find(|s| s.active).cloned())
    }
}
