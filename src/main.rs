use std::sync::{Arc, Mutex};

use tracing_subscriber::EnvFilter;

use barbershop::config::AppConfig;
use barbershop::db;
use barbershop::state::{local_clock, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env()?;

    let conn = db::init_db(&config.database_url)?;
    tracing::info!(
        "business hours: {} every {} minutes",
        config.business_hours.to_human_readable(),
        config.business_hours.slot_minutes
    );

    let addr = format!("0.0.0.0:{}", config.port);

    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config,
        clock: local_clock,
    });

    let app = barbershop::app(state);

    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
