//! Catalog models: billable services and dispensable medicines.
//!
//! The catalog is externally owned reference data. This crate only reads
//! it to validate and price clinical records, plus a small write path for
//! seeding fixtures and deployments.

use serde::{Deserialize, Serialize};

/// A billable clinical service (examination, test, procedure).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Service {
    /// Unique service ID
    pub id: String,
    /// Display name
    pub name: String,
    /// Unit price in minor currency units
    pub price: i64,
    /// Whether the service is currently orderable
    pub active: bool,
}

impl Service {
    /// Create a new active service.
    pub fn new(id: String, name: String, price: i64) -> Self {
        Self {
            id,
            name,
            price,
            active: true,
        }
    }
}

/// A dispensable medicine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Medicine {
    /// Unique medicine ID
    pub id: String,
    /// Display name (unique lookups by name rely on this)
    pub name: String,
    /// Dispensing unit (tablet, bottle, ...)
    pub unit: Option<String>,
    /// Unit price in minor currency units
    pub price: i64,
    /// Whether the medicine is currently dispensable
    pub active: bool,
}

impl Medicine {
    /// Create a new active medicine.
    pub fn new(id: String, name: String, price: i64) -> Self {
        Self {
            id,
            name,
            unit: None,
            price,
            active: true,
        }
    }
}
