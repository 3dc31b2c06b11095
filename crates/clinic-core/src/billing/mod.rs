//! Invoice builder.
//!
//! Pure derivation of one invoice from the clinical plan of one
//! completed examination. Fail-closed: either the plan yields a
//! well-formed invoice with at least one line, or the whole completion
//! is rejected.

use chrono::{DateTime, FixedOffset, Offset, Utc};

use crate::config::Config;
use crate::db::CatalogLookup;
use crate::error::{ClinicError, ClinicResult};
use crate::models::{Appointment, Invoice, InvoiceDetail, InvoiceStatus};
use crate::records::ClinicalPlan;

/// Invoice + lines to persist for one completed examination.
#[derive(Debug, Clone)]
pub struct InvoicePlan {
    pub invoice: Invoice,
    pub details: Vec<InvoiceDetail>,
}

/// A prospective invoice line before persistence.
#[derive(Debug, Clone)]
struct CandidateLine {
    service_id: Option<String>,
    medicine_id: Option<String>,
    description: String,
    quantity: i64,
    unit_price: i64,
    line_total: i64,
}

/// Derive the invoice for one appointment from its clinical plan.
///
/// Ordered services bill one unit at the catalog price; prescription
/// lines carry their own quantities and totals. A zero total falls back
/// to one default-consultation line so no completed examination goes
/// unbilled.
pub fn plan_invoice(
    appointment: &Appointment,
    clinical: &ClinicalPlan,
    catalog: &dyn CatalogLookup,
    config: &Config,
    now: DateTime<Utc>,
) -> ClinicResult<InvoicePlan> {
    let mut candidates: Vec<CandidateLine> = Vec::new();
    let mut total: i64 = 0;

    for (order, service) in &clinical.service_orders {
        candidates.push(CandidateLine {
            service_id: Some(order.service_id.clone()),
            medicine_id: None,
            description: service.name.clone(),
            quantity: 1,
            unit_price: service.price,
            line_total: service.price,
        });
        total = add_checked(total, service.price)?;
    }

    if let Some((_, details)) = &clinical.prescription {
        for (detail, medicine) in details {
            candidates.push(CandidateLine {
                service_id: None,
                medicine_id: Some(detail.medicine_id.clone()),
                description: medicine.name.clone(),
                quantity: detail.quantity,
                unit_price: detail.unit_price,
                line_total: detail.total_price,
            });
            total = add_checked(total, detail.total_price)?;
        }
    }

    if total == 0 {
        let service = catalog
            .default_examination_service(
                config.default_service_id.as_deref(),
                &config.default_service_pattern,
            )?
            .ok_or(ClinicError::NoBillableService)?;

        tracing::info!(
            appointment_id = %appointment.id,
            service_id = %service.id,
            fee = config.default_consultation_fee,
            "zero-total completion, billing default consultation fee"
        );
        candidates.push(CandidateLine {
            service_id: Some(service.id),
            medicine_id: None,
            description: service.name,
            quantity: 1,
            unit_price: config.default_consultation_fee,
            line_total: config.default_consultation_fee,
        });
        total = add_checked(total, config.default_consultation_fee)?;
    }

    let invoice_id = uuid::Uuid::new_v4().to_string();
    let mut details = Vec::new();
    for candidate in candidates {
        // Should not occur given how candidates are built above
        if candidate.service_id.is_none() && candidate.medicine_id.is_none() {
            tracing::warn!(
                invoice_id,
                description = candidate.description,
                "dropping invoice candidate without a catalog reference"
            );
            total = total.saturating_sub(candidate.line_total);
            continue;
        }
        details.push(InvoiceDetail {
            id: uuid::Uuid::new_v4().to_string(),
            invoice_id: invoice_id.clone(),
            service_id: candidate.service_id,
            medicine_id: candidate.medicine_id,
            description: candidate.description,
            quantity: candidate.quantity,
            unit_price: candidate.unit_price,
            line_total: candidate.line_total,
        });
    }

    if details.is_empty() {
        return Err(ClinicError::EmptyInvoice);
    }

    let invoice = Invoice {
        id: invoice_id,
        patient_id: appointment.patient_id.clone(),
        appointment_id: appointment.id.clone(),
        total_amount: total,
        status: InvoiceStatus::PendingPayment,
        order_id: None,
        payment_method: None,
        transaction_id: None,
        paid_at: None,
        claimed_at: None,
        created_at: clinic_local(now, config).to_rfc3339(),
    };

    Ok(InvoicePlan { invoice, details })
}

fn add_checked(total: i64, line_total: i64) -> ClinicResult<i64> {
    total.checked_add(line_total).ok_or_else(|| {
        ClinicError::validation("totalAmount", "exceeds the representable amount")
    })
}

/// Timestamp in the clinic's configured local offset.
fn clinic_local(now: DateTime<Utc>, config: &Config) -> DateTime<FixedOffset> {
    // An out-of-range configured offset falls back to UTC
    let offset =
        FixedOffset::east_opt(config.clinic_utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix());
    now.with_timezone(&offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Medicine, Service};
    use crate::records::{plan_clinical_records, CompleteExaminationInput, PrescriptionLineInput};
    use crate::testutil::StaticCatalog;

    fn catalog() -> StaticCatalog {
        StaticCatalog {
            services: vec![
                Service::new("SVC-EXAM".into(), "General examination".into(), 50_000),
                Service::new("SVC-XRAY".into(), "Chest X-ray".into(), 150_000),
            ],
            medicines: vec![Medicine::new(
                "MED-PARA".into(),
                "Paracetamol 500mg".into(),
                2_000,
            )],
        }
    }

    fn appointment() -> Appointment {
        Appointment::new(
            "patient-1".into(),
            "staff-1".into(),
            "2026-01-05T09:00:00Z".into(),
        )
    }

    fn plan(input: &CompleteExaminationInput) -> ClinicalPlan {
        plan_clinical_records(input, &appointment(), &catalog(), "doctor-7").unwrap()
    }

    #[test]
    fn test_total_is_sum_of_lines() {
        let input = CompleteExaminationInput {
            services: vec!["SVC-XRAY".into()],
            prescriptions: vec![PrescriptionLineInput {
                medicine_id: Some("MED-PARA".into()),
                medicine: None,
                quantity: 10,
                dosage: None,
                unit_price: 2_000,
                total_price: None,
            }],
            ..Default::default()
        };

        let invoice_plan = plan_invoice(
            &appointment(),
            &plan(&input),
            &catalog(),
            &Config::default(),
            Utc::now(),
        )
        .unwrap();

        assert_eq!(invoice_plan.details.len(), 2);
        assert_eq!(invoice_plan.invoice.total_amount, 170_000);
        let line_sum: i64 = invoice_plan.details.iter().map(|d| d.line_total).sum();
        assert_eq!(invoice_plan.invoice.total_amount, line_sum);
        assert_eq!(invoice_plan.invoice.status, InvoiceStatus::PendingPayment);
        assert!(invoice_plan.details.iter().all(InvoiceDetail::has_reference));
    }

    #[test]
    fn test_description_is_a_snapshot() {
        let input = CompleteExaminationInput {
            services: vec!["SVC-XRAY".into()],
            ..Default::default()
        };

        let invoice_plan = plan_invoice(
            &appointment(),
            &plan(&input),
            &catalog(),
            &Config::default(),
            Utc::now(),
        )
        .unwrap();

        assert_eq!(invoice_plan.details[0].description, "Chest X-ray");
        assert_eq!(invoice_plan.details[0].unit_price, 150_000);
    }

    #[test]
    fn test_zero_total_falls_back_to_consultation_fee() {
        let input = CompleteExaminationInput::default();

        let invoice_plan = plan_invoice(
            &appointment(),
            &plan(&input),
            &catalog(),
            &Config::default(),
            Utc::now(),
        )
        .unwrap();

        assert_eq!(invoice_plan.details.len(), 1);
        assert_eq!(invoice_plan.invoice.total_amount, 50_000);
        // Pattern "exam" matches the general examination service
        assert_eq!(invoice_plan.details[0].service_id.as_deref(), Some("SVC-EXAM"));
        assert_eq!(invoice_plan.details[0].unit_price, 50_000);
    }

    #[test]
    fn test_fallback_prefers_configured_service_id() {
        let input = CompleteExaminationInput::default();
        let config = Config {
            default_service_id: Some("SVC-XRAY".into()),
            ..Config::default()
        };

        let invoice_plan = plan_invoice(
            &appointment(),
            &plan(&input),
            &catalog(),
            &config,
            Utc::now(),
        )
        .unwrap();

        assert_eq!(invoice_plan.details[0].service_id.as_deref(), Some("SVC-XRAY"));
        // The fallback bills the configured fee, not the service's price
        assert_eq!(invoice_plan.invoice.total_amount, 50_000);
    }

    #[test]
    fn test_empty_catalog_fails_closed() {
        let empty = StaticCatalog {
            services: vec![],
            medicines: vec![],
        };
        let input = CompleteExaminationInput::default();
        let clinical = plan_clinical_records(&input, &appointment(), &empty, "doctor-7").unwrap();

        let err = plan_invoice(
            &appointment(),
            &clinical,
            &empty,
            &Config::default(),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, ClinicError::NoBillableService));
    }

    #[test]
    fn test_total_overflow_is_rejected() {
        // Client-supplied line totals pass through unmultiplied; their
        // sum must still not wrap
        let line = PrescriptionLineInput {
            medicine_id: Some("MED-PARA".into()),
            medicine: None,
            quantity: 1,
            dosage: None,
            unit_price: 0,
            total_price: Some(i64::MAX),
        };
        let input = CompleteExaminationInput {
            prescriptions: vec![line.clone(), line],
            ..Default::default()
        };

        let err = plan_invoice(
            &appointment(),
            &plan(&input),
            &catalog(),
            &Config::default(),
            Utc::now(),
        )
        .unwrap_err();
        match err {
            ClinicError::Validation { errors } => {
                assert!(errors.contains_key("totalAmount"));
            }
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    proptest::proptest! {
        // Holds for any mix of prescription lines, including the
        // all-zero case where the consultation-fee fallback kicks in
        #[test]
        fn prop_total_equals_line_sum(
            lines in proptest::collection::vec((1i64..=60, 0i64..=500_000), 1..6)
        ) {
            let input = CompleteExaminationInput {
                prescriptions: lines
                    .iter()
                    .map(|&(quantity, unit_price)| PrescriptionLineInput {
                        medicine_id: Some("MED-PARA".into()),
                        medicine: None,
                        quantity,
                        dosage: None,
                        unit_price,
                        total_price: None,
                    })
                    .collect(),
                ..Default::default()
            };

            let clinical =
                plan_clinical_records(&input, &appointment(), &catalog(), "doctor-7").unwrap();
            let invoice_plan = plan_invoice(
                &appointment(),
                &clinical,
                &catalog(),
                &Config::default(),
                Utc::now(),
            )
            .unwrap();

            proptest::prop_assert!(!invoice_plan.details.is_empty());
            let line_sum: i64 = invoice_plan.details.iter().map(|d| d.line_total).sum();
            proptest::prop_assert_eq!(invoice_plan.invoice.total_amount, line_sum);
        }
    }

    #[test]
    fn test_created_at_uses_clinic_offset() {
        let input = CompleteExaminationInput::default();
        let config = Config {
            clinic_utc_offset_minutes: 7 * 60,
            ..Config::default()
        };

        let now = "2026-01-05T09:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let invoice_plan =
            plan_invoice(&appointment(), &plan(&input), &catalog(), &config, now).unwrap();

        assert_eq!(invoice_plan.invoice.created_at, "2026-01-05T16:00:00+07:00");
    }
}
