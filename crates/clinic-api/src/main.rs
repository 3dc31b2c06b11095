//! Clinic settlement API server.
//!
//! Configuration comes from the environment:
//! - `CLINIC_API_ADDR`: bind address (default "0.0.0.0:3000")
//! - `CLINIC_DB_PATH`: SQLite database file (default "clinic.db")
//! - `CLINIC_GATEWAY_SECRET`: shared secret for notification signatures
//! - `CLINIC_GATEWAY_URL`: sandbox gateway base URL
//! - `CLINIC_RETURN_URL`: frontend payment-result page
//! - `CLINIC_DEFAULT_SERVICE_ID`: preferred default examination service
//! - `CLINIC_CONSULTATION_FEE`: zero-total fallback fee, minor units
//! - `CLINIC_STUCK_TIMEOUT_MINUTES`: stuck-payment sweep cutoff
//! - `CLINIC_UTC_OFFSET_MINUTES`: clinic local-time offset

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clinic_api::{router, AppState};
use clinic_core::payment::SandboxGateway;
use clinic_core::{Config, Database};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("clinic_api=info".parse()?)
                .add_directive("clinic_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("CLINIC_API_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let db_path = std::env::var("CLINIC_DB_PATH").unwrap_or_else(|_| "clinic.db".into());
    let return_url = std::env::var("CLINIC_RETURN_URL")
        .unwrap_or_else(|_| "http://localhost:5173/payment-result".into());

    let config = config_from_env()?;
    if config.gateway_secret.is_empty() {
        tracing::warn!("CLINIC_GATEWAY_SECRET is not set, callback signatures cannot verify");
    }

    let gateway = match std::env::var("CLINIC_GATEWAY_URL") {
        Ok(url) => SandboxGateway::new(url),
        Err(_) => SandboxGateway::default(),
    };

    let db = Database::open(&db_path)?;
    tracing::info!(db_path, "database opened");

    let state = AppState::new(db, Arc::new(gateway), config, return_url);
    let app = router(state);

    tracing::info!(addr, "starting clinic API");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn config_from_env() -> anyhow::Result<Config> {
    let mut config = Config {
        gateway_secret: std::env::var("CLINIC_GATEWAY_SECRET").unwrap_or_default(),
        default_service_id: std::env::var("CLINIC_DEFAULT_SERVICE_ID").ok(),
        ..Config::default()
    };

    if let Ok(fee) = std::env::var("CLINIC_CONSULTATION_FEE") {
        config.default_consultation_fee = fee.parse()?;
    }
    if let Ok(minutes) = std::env::var("CLINIC_STUCK_TIMEOUT_MINUTES") {
        config.stuck_payment_timeout_minutes = minutes.parse()?;
    }
    if let Ok(offset) = std::env::var("CLINIC_UTC_OFFSET_MINUTES") {
        config.clinic_utc_offset_minutes = offset.parse()?;
    }

    Ok(config)
}
