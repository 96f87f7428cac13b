use std::env;

use crate::models::business_hours::{
    BusinessHours, DEFAULT_CLOSE, DEFAULT_OPEN, DEFAULT_SLOT_MINUTES,
};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    /// Allowed CORS origins; a single `*` allows any origin.
    pub cors_origins: Vec<String>,
    pub business_hours: BusinessHours,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let slot_minutes = match env::var("SLOT_MINUTES") {
            Ok(v) => v
                .parse()
                .map_err(|_| anyhow::anyhow!("SLOT_MINUTES must be a whole number, got {v}"))?,
            Err(_) => DEFAULT_SLOT_MINUTES,
        };

        let business_hours = BusinessHours::parse(
            &env::var("BUSINESS_OPEN").unwrap_or_else(|_| DEFAULT_OPEN.to_string()),
            &env::var("BUSINESS_CLOSE").unwrap_or_else(|_| DEFAULT_CLOSE.to_string()),
            slot_minutes,
            &env::var("CLOSED_DAYS").unwrap_or_default(),
        )?;

        Ok(Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "barbershop.db".to_string()),
            cors_origins: env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".to_string())
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect(),
            business_hours,
        })
    }
}
