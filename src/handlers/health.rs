use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use crate::db::queries;
use crate::errors::AppError;
use crate::state::AppState;

pub async fn health(State(state): State<Arc<AppState>>) -> Result<Json<serde_json::Value>, AppError> {
    queries::ping(&state.db())?;
    Ok(Json(serde_json::json!({ "status": "ok", "database": "ok" })))
}

pub async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "Barbershop API",
        "version": env!("CARGO_PKG_VERSION"),
        "health": "/health",
    }))
}
