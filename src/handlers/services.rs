use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use super::{require_text, Pagination};
use super::extract::{ValidJson, ValidQuery};
use crate::db::queries;
use crate::errors::AppError;
use crate::models::Service;
use crate::state::AppState;

const MAX_DURATION_MINUTES: i64 = 8 * 60;

fn not_found(id: &str) -> AppError {
    AppError::NotFound(format!("service {id}"))
}

fn check_duration(duration_minutes: i64) -> Result<i64, AppError> {
    if !(1..=MAX_DURATION_MINUTES).contains(&duration_minutes) {
        return Err(AppError::Validation(format!(
            "duration_minutes must be between 1 and {MAX_DURATION_MINUTES}"
        )));
    }
    Ok(duration_minutes)
}

/// Prices are kept to cents.
fn check_price(price: f64) -> Result<f64, AppError> {
    if !price.is_finite() || price < 0.0 {
        return Err(AppError::Validation(
            "price must be a non-negative amount".to_string(),
        ));
    }
    Ok((price * 100.0).round() / 100.0)
}

// GET /api/v1/services
pub async fn list_services(
    State(state): State<Arc<AppState>>,
    ValidQuery(page): ValidQuery<Pagination>,
) -> Result<Json<Vec<Service>>, AppError> {
    let (skip, limit) = page.bounds();
    let services = queries::list_services(&state.db(), skip, limit)?;
    Ok(Json(services))
}

// GET /api/v1/services/:id
pub async fn get_service(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Service>, AppError> {
    let service = queries::get_service(&state.db(), &id)?.ok_or_else(|| not_found(&id))?;
    Ok(Json(service))
}

// POST /api/v1/services
#[derive(Deserialize)]
pub struct CreateServiceRequest {
    pub name: String,
    pub duration_minutes: i64,
    pub price: f64,
}

pub async fn create_service(
    State(state): State<Arc<AppState>>,
    ValidJson(body): ValidJson<CreateServiceRequest>,
) -> Result<(StatusCode, Json<Service>), AppError> {
    let service = Service {
        id: uuid::Uuid::new_v4().to_string(),
        name: require_text("name", &body.name, 3, 100)?,
        duration_minutes: check_duration(body.duration_minutes)?,
        price: check_price(body.price)?,
        created_at: queries::now(),
    };

    queries::create_service(&state.db(), &service)?;
    tracing::info!(service_id = %service.id, name = %service.name, "service created");

    Ok((StatusCode::CREATED, Json(service)))
}

// PUT /api/v1/services/:id
#[derive(Deserialize)]
pub struct UpdateServiceRequest {
    pub name: Option<String>,
    pub duration_minutes: Option<i64>,
    pub price: Option<f64>,
}

pub async fn update_service(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ValidJson(body): ValidJson<UpdateServiceRequest>,
) -> Result<Json<Service>, AppError> {
    let db = state.db();
    let mut service = queries::get_service(&db, &id)?.ok_or_else(|| not_found(&id))?;

    if let Some(name) = body.name {
        service.name = require_text("name", &name, 3, 100)?;
    }
    if let Some(duration_minutes) = body.duration_minutes {
        service.duration_minutes = check_duration(duration_minutes)?;
    }
    if let Some(price) = body.price {
        service.price = check_price(price)?;
    }

    if !queries::update_service(&db, &service)? {
        return Err(not_found(&id));
    }
    Ok(Json(service))
}

// DELETE /api/v1/services/:id
pub async fn delete_service(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    if !queries::delete_service(&state.db(), &id)? {
        return Err(not_found(&id));
    }
    tracing::info!(service_id = %id, "service deleted");
    Ok(StatusCode::NO_CONTENT)
}
