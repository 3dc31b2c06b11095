//! Invoice models derived from the clinical records of one encounter.

use serde::{Deserialize, Serialize};

/// Settlement status of an invoice.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum InvoiceStatus {
    /// Awaiting payment; may be unclaimed or claimed by an order id
    PendingPayment,
    /// Settled; `paid_at` and `transaction_id` are set, total is frozen
    Paid,
    /// Voided
    Cancelled,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::PendingPayment => "pending_payment",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending_payment" => Some(InvoiceStatus::PendingPayment),
            "paid" => Some(InvoiceStatus::Paid),
            "cancelled" => Some(InvoiceStatus::Cancelled),
            _ => None,
        }
    }
}

/// One invoice per completed encounter.
///
/// The payment-correlation fields (`order_id`, `payment_method`,
/// `transaction_id`, `paid_at`, `claimed_at`) are owned by the payment
/// reconciler; everything else is frozen at creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Invoice {
    /// Unique invoice ID
    pub id: String,
    /// Billed patient
    pub patient_id: String,
    /// Source appointment (at most one invoice per appointment)
    pub appointment_id: String,
    /// Sum of line totals, minor currency units
    pub total_amount: i64,
    /// Settlement status
    pub status: InvoiceStatus,
    /// External gateway order id; set while a payment attempt is in flight
    pub order_id: Option<String>,
    /// Payment method reported by / sent to the gateway
    pub payment_method: Option<String>,
    /// Gateway transaction id, set when paid
    pub transaction_id: Option<String>,
    /// Settlement timestamp (RFC3339), set when paid
    pub paid_at: Option<String>,
    /// When the current order id was attached (RFC3339, UTC)
    pub claimed_at: Option<String>,
    /// Creation timestamp in the clinic's local offset (RFC3339)
    pub created_at: String,
}

/// One billable line on an invoice.
///
/// References at most one catalog item: exactly one of `service_id` /
/// `medicine_id` is set. The description and prices are snapshots so
/// historical invoices survive later catalog changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InvoiceDetail {
    /// Unique line ID
    pub id: String,
    /// Owning invoice
    pub invoice_id: String,
    /// Billed service, if this line is a service
    pub service_id: Option<String>,
    /// Billed medicine, if this line is a medicine
    pub medicine_id: Option<String>,
    /// Description snapshot taken from the catalog at billing time
    pub description: String,
    /// Quantity
    pub quantity: i64,
    /// Unit price snapshot, minor currency units
    pub unit_price: i64,
    /// Line total, minor currency units
    pub line_total: i64,
}

impl InvoiceDetail {
    /// Whether the line carries a catalog reference at all.
    pub fn has_reference(&self) -> bool {
        self.service_id.is_some() || self.medicine_id.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invoice_status_roundtrip() {
        for status in [
            InvoiceStatus::PendingPayment,
            InvoiceStatus::Paid,
            InvoiceStatus::Cancelled,
        ] {
            assert_eq!(InvoiceStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(InvoiceStatus::parse(""), None);
    }
}
