//! Clinical record builder.
//!
//! Pure planning step of `CompleteExamination`: validates the request,
//! resolves catalog references, and returns the set of rows to persist.
//! The enclosing transaction applies the plan, so a failure here rolls
//! the whole completion back.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::db::CatalogLookup;
use crate::error::{ClinicError, ClinicResult};
use crate::models::{
    Appointment, Diagnosis, Medicine, Prescription, PrescriptionDetail, Service, ServiceOrder,
};

/// Longest accepted free-text field.
pub const MAX_TEXT_LEN: usize = 2_000;

/// Request payload for completing an examination.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteExaminationInput {
    /// Reported symptoms
    #[serde(default)]
    pub symptoms: Option<String>,
    /// Diagnosis text
    #[serde(default)]
    pub diagnosis: Option<String>,
    /// Usage / follow-up instructions
    #[serde(default)]
    pub instructions: Option<String>,
    /// Catalog service ids to order; unknown ids are skipped
    #[serde(default)]
    pub services: Vec<String>,
    /// Prescription lines; each must resolve to exactly one medicine
    #[serde(default)]
    pub prescriptions: Vec<PrescriptionLineInput>,
}

/// One requested prescription line. The medicine is identified by id or
/// by exact catalog name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrescriptionLineInput {
    /// Medicine id, when the client knows it
    #[serde(default)]
    pub medicine_id: Option<String>,
    /// Exact medicine name, as an alternative to the id
    #[serde(default)]
    pub medicine: Option<String>,
    /// Quantity (positive integer)
    pub quantity: i64,
    /// Dosage text
    #[serde(default)]
    pub dosage: Option<String>,
    /// Unit price, minor currency units
    pub unit_price: i64,
    /// Line total; computed as quantity * unit price when absent
    #[serde(default)]
    pub total_price: Option<i64>,
}

/// Rows to persist for one completed examination, before invoicing.
#[derive(Debug, Clone)]
pub struct ClinicalPlan {
    /// Diagnosis upsert value (always present; free text may be empty)
    pub diagnosis: Diagnosis,
    /// Accepted service orders with their price snapshots
    pub service_orders: Vec<(ServiceOrder, Service)>,
    /// Prescription header + lines, when any line was requested
    pub prescription: Option<(Prescription, Vec<(PrescriptionDetail, Medicine)>)>,
}

/// Validate the completion input and resolve it into rows to persist.
///
/// Unknown service ids are skipped (permissive intake policy); an
/// unresolvable prescription line fails the whole completion.
pub fn plan_clinical_records(
    input: &CompleteExaminationInput,
    appointment: &Appointment,
    catalog: &dyn CatalogLookup,
    acting_staff_id: &str,
) -> ClinicResult<ClinicalPlan> {
    validate_input(input)?;

    let diagnosis = Diagnosis {
        id: uuid::Uuid::new_v4().to_string(),
        appointment_id: appointment.id.clone(),
        staff_id: acting_staff_id.to_string(),
        symptoms: trimmed(&input.symptoms),
        diagnosis: trimmed(&input.diagnosis),
        notes: trimmed(&input.instructions),
    };

    let mut service_orders = Vec::new();
    for service_id in &input.services {
        match catalog.find_service(service_id)? {
            Some(service) => {
                let order =
                    ServiceOrder::new(appointment.id.clone(), service.id.clone(), acting_staff_id);
                service_orders.push((order, service));
            }
            None => {
                tracing::debug!(service_id, "skipping unknown service id");
            }
        }
    }

    let prescription = if input.prescriptions.is_empty() {
        None
    } else {
        let header = Prescription::new(
            appointment.id.clone(),
            acting_staff_id,
            trimmed(&input.instructions),
        );

        let mut details = Vec::new();
        for (i, line) in input.prescriptions.iter().enumerate() {
            let medicine = resolve_medicine(line, catalog)?;
            let total_price = match line.total_price {
                Some(total) => total,
                None => line.quantity.checked_mul(line.unit_price).ok_or_else(|| {
                    ClinicError::validation(
                        &format!("prescriptions[{i}].totalPrice"),
                        "exceeds the representable amount",
                    )
                })?,
            };
            details.push((
                PrescriptionDetail {
                    id: uuid::Uuid::new_v4().to_string(),
                    prescription_id: header.id.clone(),
                    medicine_id: medicine.id.clone(),
                    quantity: line.quantity,
                    dosage: trimmed(&line.dosage),
                    unit_price: line.unit_price,
                    total_price,
                },
                medicine,
            ));
        }
        Some((header, details))
    };

    Ok(ClinicalPlan {
        diagnosis,
        service_orders,
        prescription,
    })
}

/// Resolve one prescription line to exactly one medicine, by id first,
/// then by unique name.
fn resolve_medicine(
    line: &PrescriptionLineInput,
    catalog: &dyn CatalogLookup,
) -> ClinicResult<Medicine> {
    if let Some(id) = &line.medicine_id {
        return catalog
            .find_medicine(id)?
            .ok_or_else(|| ClinicError::UnknownMedicine(id.clone()));
    }

    let name = line
        .medicine
        .as_deref()
        .map(str::trim)
        .unwrap_or_default();
    let mut matches = catalog.find_medicines_by_name(name)?;
    match matches.len() {
        1 => Ok(matches.remove(0)),
        0 => Err(ClinicError::UnknownMedicine(name.to_string())),
        _ => Err(ClinicError::UnknownMedicine(format!(
            "{name} (name is ambiguous)"
        ))),
    }
}

/// Field-level validation; collects every failure before reporting.
fn validate_input(input: &CompleteExaminationInput) -> ClinicResult<()> {
    let mut errors = BTreeMap::new();

    for (field, value) in [
        ("symptoms", &input.symptoms),
        ("diagnosis", &input.diagnosis),
        ("instructions", &input.instructions),
    ] {
        if let Some(text) = value {
            if text.chars().count() > MAX_TEXT_LEN {
                errors.insert(
                    field.to_string(),
                    format!("must be at most {MAX_TEXT_LEN} characters"),
                );
            }
        }
    }

    for (i, line) in input.prescriptions.iter().enumerate() {
        if line.medicine_id.is_none()
            && line.medicine.as_deref().map(str::trim).unwrap_or("").is_empty()
        {
            errors.insert(
                format!("prescriptions[{i}].medicine"),
                "either medicineId or medicine name is required".into(),
            );
        }
        if line.quantity <= 0 {
            errors.insert(
                format!("prescriptions[{i}].quantity"),
                "must be a positive integer".into(),
            );
        }
        if line.unit_price < 0 {
            errors.insert(
                format!("prescriptions[{i}].unitPrice"),
                "must not be negative".into(),
            );
        }
        if let Some(total) = line.total_price {
            if total < 0 {
                errors.insert(
                    format!("prescriptions[{i}].totalPrice"),
                    "must not be negative".into(),
                );
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ClinicError::Validation { errors })
    }
}

fn trimmed(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::StaticCatalog;

    fn catalog() -> StaticCatalog {
        StaticCatalog {
            services: vec![
                Service::new("SVC-EXAM".into(), "General examination".into(), 50_000),
                Service::new("SVC-XRAY".into(), "Chest X-ray".into(), 150_000),
            ],
            medicines: vec![
                Medicine::new("MED-PARA".into(), "Paracetamol 500mg".into(), 2_000),
                Medicine::new("MED-AMOX".into(), "Amoxicillin 250mg".into(), 5_000),
            ],
        }
    }

    fn appointment() -> Appointment {
        Appointment::new(
            "patient-1".into(),
            "staff-1".into(),
            "2026-01-05T09:00:00Z".into(),
        )
    }

    #[test]
    fn test_plan_with_services_and_prescriptions() {
        let input = CompleteExaminationInput {
            symptoms: Some("fever".into()),
            diagnosis: Some("flu".into()),
            instructions: Some("rest".into()),
            services: vec!["SVC-XRAY".into()],
            prescriptions: vec![PrescriptionLineInput {
                medicine_id: Some("MED-PARA".into()),
                medicine: None,
                quantity: 10,
                dosage: Some("1 tablet twice daily".into()),
                unit_price: 2_000,
                total_price: None,
            }],
        };

        let plan = plan_clinical_records(&input, &appointment(), &catalog(), "doctor-7").unwrap();

        assert_eq!(plan.diagnosis.staff_id, "doctor-7");
        assert_eq!(plan.service_orders.len(), 1);
        assert_eq!(plan.service_orders[0].0.service_id, "SVC-XRAY");
        assert_eq!(plan.service_orders[0].0.ordered_by, "doctor-7");

        let (header, details) = plan.prescription.unwrap();
        assert_eq!(header.staff_id, "doctor-7");
        assert_eq!(details.len(), 1);
        assert_eq!(details[0].0.medicine_id, "MED-PARA");
        // Missing totalPrice is computed
        assert_eq!(details[0].0.total_price, 20_000);
    }

    #[test]
    fn test_unknown_service_ids_are_skipped() {
        let input = CompleteExaminationInput {
            services: vec!["SVC-XRAY".into(), "SVC-GONE".into()],
            ..Default::default()
        };

        let plan = plan_clinical_records(&input, &appointment(), &catalog(), "doctor-7").unwrap();
        assert_eq!(plan.service_orders.len(), 1);
        assert_eq!(plan.service_orders[0].0.service_id, "SVC-XRAY");
    }

    #[test]
    fn test_medicine_resolution_by_name() {
        let input = CompleteExaminationInput {
            prescriptions: vec![PrescriptionLineInput {
                medicine_id: None,
                medicine: Some("Amoxicillin 250mg".into()),
                quantity: 14,
                dosage: None,
                unit_price: 5_000,
                total_price: Some(70_000),
            }],
            ..Default::default()
        };

        let plan = plan_clinical_records(&input, &appointment(), &catalog(), "doctor-7").unwrap();
        let (_, details) = plan.prescription.unwrap();
        assert_eq!(details[0].0.medicine_id, "MED-AMOX");
        assert_eq!(details[0].0.total_price, 70_000);
    }

    #[test]
    fn test_unknown_medicine_fails_whole_plan() {
        let input = CompleteExaminationInput {
            prescriptions: vec![
                PrescriptionLineInput {
                    medicine_id: Some("MED-PARA".into()),
                    medicine: None,
                    quantity: 10,
                    dosage: None,
                    unit_price: 2_000,
                    total_price: None,
                },
                PrescriptionLineInput {
                    medicine_id: None,
                    medicine: Some("Snake Oil".into()),
                    quantity: 1,
                    dosage: None,
                    unit_price: 1_000,
                    total_price: None,
                },
            ],
            ..Default::default()
        };

        let err = plan_clinical_records(&input, &appointment(), &catalog(), "doctor-7")
            .unwrap_err();
        assert!(matches!(err, ClinicError::UnknownMedicine(name) if name == "Snake Oil"));
    }

    #[test]
    fn test_ambiguous_medicine_name_fails() {
        let mut cat = catalog();
        cat.medicines
            .push(Medicine::new("MED-PARA2".into(), "Paracetamol 500mg".into(), 2_100));

        let input = CompleteExaminationInput {
            prescriptions: vec![PrescriptionLineInput {
                medicine_id: None,
                medicine: Some("Paracetamol 500mg".into()),
                quantity: 1,
                dosage: None,
                unit_price: 2_000,
                total_price: None,
            }],
            ..Default::default()
        };

        let err = plan_clinical_records(&input, &appointment(), &cat, "doctor-7").unwrap_err();
        assert!(matches!(err, ClinicError::UnknownMedicine(_)));
    }

    #[test]
    fn test_validation_collects_all_field_errors() {
        let input = CompleteExaminationInput {
            symptoms: Some("x".repeat(MAX_TEXT_LEN + 1)),
            prescriptions: vec![PrescriptionLineInput {
                medicine_id: None,
                medicine: None,
                quantity: 0,
                dosage: None,
                unit_price: -1,
                total_price: Some(-5),
            }],
            ..Default::default()
        };

        let err = plan_clinical_records(&input, &appointment(), &catalog(), "doctor-7")
            .unwrap_err();
        match err {
            ClinicError::Validation { errors } => {
                assert!(errors.contains_key("symptoms"));
                assert!(errors.contains_key("prescriptions[0].medicine"));
                assert!(errors.contains_key("prescriptions[0].quantity"));
                assert!(errors.contains_key("prescriptions[0].unitPrice"));
                assert!(errors.contains_key("prescriptions[0].totalPrice"));
            }
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    #[test]
    fn test_line_total_overflow_is_a_validation_error() {
        let input = CompleteExaminationInput {
            prescriptions: vec![PrescriptionLineInput {
                medicine_id: Some("MED-PARA".into()),
                medicine: None,
                quantity: i64::MAX / 2,
                dosage: None,
                unit_price: 4,
                total_price: None,
            }],
            ..Default::default()
        };

        let err = plan_clinical_records(&input, &appointment(), &catalog(), "doctor-7")
            .unwrap_err();
        match err {
            ClinicError::Validation { errors } => {
                assert!(errors.contains_key("prescriptions[0].totalPrice"));
            }
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_input_still_plans_diagnosis_only() {
        let input = CompleteExaminationInput::default();
        let plan = plan_clinical_records(&input, &appointment(), &catalog(), "doctor-7").unwrap();
        assert!(plan.service_orders.is_empty());
        assert!(plan.prescription.is_none());
        assert!(plan.diagnosis.symptoms.is_none());
    }
}
