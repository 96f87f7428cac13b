use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use super::{optional_phone, parse_date, require_text, Pagination};
use super::extract::{ValidJson, ValidQuery};
use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Appointment, Barber};
use crate::services::scheduling;
use crate::state::AppState;

fn not_found(id: &str) -> AppError {
    AppError::NotFound(format!("barber {id}"))
}

// GET /api/v1/barbers
pub async fn list_barbers(
    State(state): State<Arc<AppState>>,
    ValidQuery(page): ValidQuery<Pagination>,
) -> Result<Json<Vec<Barber>>, AppError> {
    let (skip, limit) = page.bounds();
    let barbers = queries::list_barbers(&state.db(), skip, limit)?;
    Ok(Json(barbers))
}

// GET /api/v1/barbers/:id
pub async fn get_barber(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Barber>, AppError> {
    let barber = queries::get_barber(&state.db(), &id)?.ok_or_else(|| not_found(&id))?;
    Ok(Json(barber))
}

// POST /api/v1/barbers
#[derive(Deserialize)]
pub struct CreateBarberRequest {
    pub name: String,
    pub phone: Option<String>,
}

pub async fn create_barber(
    State(state): State<Arc<AppState>>,
    ValidJson(body): ValidJson<CreateBarberRequest>,
) -> Result<(StatusCode, Json<Barber>), AppError> {
    let barber = Barber {
        id: uuid::Uuid::new_v4().to_string(),
        name: require_text("name", &body.name, 2, 100)?,
        phone: optional_phone("phone", body.phone)?,
        created_at: queries::now(),
    };

    queries::create_barber(&state.db(), &barber)?;
    tracing::info!(barber_id = %barber.id, name = %barber.name, "barber created");

    Ok((StatusCode::CREATED, Json(barber)))
}

// PUT /api/v1/barbers/:id
#[derive(Deserialize)]
pub struct UpdateBarberRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
}

pub async fn update_barber(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ValidJson(body): ValidJson<UpdateBarberRequest>,
) -> Result<Json<Barber>, AppError> {
    let db = state.db();
    let mut barber = queries::get_barber(&db, &id)?.ok_or_else(|| not_found(&id))?;

    if let Some(name) = body.name {
        barber.name = require_text("name", &name, 2, 100)?;
    }
    if body.phone.is_some() {
        barber.phone = optional_phone("phone", body.phone)?;
    }

    if !queries::update_barber(&db, &barber)? {
        return Err(not_found(&id));
    }
    Ok(Json(barber))
}

// DELETE /api/v1/barbers/:id
pub async fn delete_barber(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    if !queries::delete_barber(&state.db(), &id)? {
        return Err(not_found(&id));
    }
    tracing::info!(barber_id = %id, "barber deleted");
    Ok(StatusCode::NO_CONTENT)
}

// GET /api/v1/barbers/:id/appointments
pub async fn get_barber_appointments(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ValidQuery(page): ValidQuery<Pagination>,
) -> Result<Json<Vec<Appointment>>, AppError> {
    let db = state.db();
    if queries::get_barber(&db, &id)?.is_none() {
        return Err(not_found(&id));
    }

    let (skip, limit) = page.bounds();
    let filter = queries::AppointmentFilter {
        barber_id: Some(id.as_str()),
        ..Default::default()
    };
    let appointments = queries::list_appointments(&db, &filter, skip, limit)?;
    Ok(Json(appointments))
}

// GET /api/v1/barbers/:id/availability?date=YYYY-MM-DD&service_id=
#[derive(Deserialize)]
pub struct AvailabilityQuery {
    pub date: String,
    pub service_id: Option<String>,
}

pub async fn get_availability(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ValidQuery(query): ValidQuery<AvailabilityQuery>,
) -> Result<Json<Vec<String>>, AppError> {
    let date = parse_date(&query.date)?;
    let hours = &state.config.business_hours;

    let db = state.db();
    if queries::get_barber(&db, &id)?.is_none() {
        return Err(not_found(&id));
    }

    let duration_minutes = match query.service_id.as_deref() {
        Some(service_id) => {
            queries::get_service(&db, service_id)?
                .ok_or_else(|| AppError::NotFound(format!("service {service_id}")))?
                .duration_minutes
        }
        None => hours.slot_minutes,
    };

    let slots = scheduling::compute_available_slots(&db, hours, &id, date, duration_minutes, state.now())?;

    Ok(Json(
        slots
            .iter()
            .map(|t| t.format("%H:%M").to_string())
            .collect(),
    ))
}
