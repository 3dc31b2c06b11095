//! HTTP surface for the clinic settlement pipeline.
//!
//! Routes:
//!
//! ```text
//! GET  /health
//! GET  /examinations/:queue_id
//! POST /examinations/:queue_id/start
//! POST /examinations/:queue_id/complete
//! POST /examinations/:queue_id/cancel
//! GET  /invoices/:invoice_id
//! POST /payments
//! POST /payments/callback            (always 200, resultCode in body)
//! GET|POST /payments/return          (303 to the frontend result page)
//! POST /payments/reset
//! POST /payments/reset-stuck
//! ```
//!
//! Mutating examination routes require an `X-Staff-Id` header naming the
//! acting staff member.

pub mod error;
pub mod handlers;

use std::sync::{Arc, Mutex};

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use clinic_core::payment::PaymentGateway;
use clinic_core::{Config, Database};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Database>>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub config: Arc<Config>,
    /// Frontend page the browser return leg redirects to
    pub return_url: Arc<String>,
}

impl AppState {
    pub fn new(
        db: Database,
        gateway: Arc<dyn PaymentGateway>,
        config: Config,
        return_url: impl Into<String>,
    ) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            gateway,
            config: Arc::new(config),
            return_url: Arc::new(return_url.into()),
        }
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/examinations/:queue_id", get(handlers::get_examination))
        .route(
            "/examinations/:queue_id/start",
            post(handlers::start_examination),
        )
        .route(
            "/examinations/:queue_id/complete",
            post(handlers::complete_examination),
        )
        .route(
            "/examinations/:queue_id/cancel",
            post(handlers::cancel_examination),
        )
        .route("/invoices/:invoice_id", get(handlers::get_invoice))
        .route("/payments", post(handlers::create_payment))
        .route("/payments/callback", post(handlers::payment_callback))
        .route(
            "/payments/return",
            get(handlers::payment_return_get).post(handlers::payment_return_post),
        )
        .route("/payments/reset", post(handlers::reset_payment))
        .route("/payments/reset-stuck", post(handlers::reset_stuck_payments))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
