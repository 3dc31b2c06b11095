//! Runtime configuration for the settlement pipeline.

/// Pipeline configuration. The API binary populates this from the
/// environment; tests construct it directly.
#[derive(Debug, Clone)]
pub struct Config {
    /// Fee billed by the zero-total fallback line, minor currency units
    pub default_consultation_fee: i64,
    /// Preferred default examination service; checked before the name
    /// pattern so a catalog rename cannot break billing
    pub default_service_id: Option<String>,
    /// Name pattern used to find the default examination service when no
    /// id is configured
    pub default_service_pattern: String,
    /// Absolute difference tolerated between a requested payment amount
    /// and the invoice total, minor currency units
    pub amount_tolerance: i64,
    /// Minutes after which a claimed-but-unsettled invoice is considered
    /// stuck and eligible for the reset sweep
    pub stuck_payment_timeout_minutes: i64,
    /// Clinic local-time offset from UTC, minutes (invoice timestamps)
    pub clinic_utc_offset_minutes: i32,
    /// Shared secret for gateway notification signatures
    pub gateway_secret: String,
    /// Seconds the gateway transport is allowed before a create-payment
    /// call is treated as failed
    pub gateway_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_consultation_fee: 50_000,
            default_service_id: None,
            default_service_pattern: "exam".into(),
            amount_tolerance: 0,
            stuck_payment_timeout_minutes: 30,
            clinic_utc_offset_minutes: 0,
            gateway_secret: String::new(),
            gateway_timeout_secs: 10,
        }
    }
}
