use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use rusqlite::Connection;
use serde::Deserialize;

use super::{optional_notes, optional_phone, parse_appointment_date, parse_date, require_text, Pagination};
use super::extract::{ValidJson, ValidQuery};
use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Appointment, AppointmentStatus};
use crate::services::scheduling;
use crate::state::AppState;

fn not_found(id: &str) -> AppError {
    AppError::NotFound(format!("appointment {id}"))
}

fn parse_status(value: &str) -> Result<AppointmentStatus, AppError> {
    AppointmentStatus::parse(value.trim()).ok_or_else(|| {
        AppError::Validation(format!(
            "invalid status '{value}', expected one of pending, confirmed, completed, cancelled"
        ))
    })
}

/// Barber must exist; the service must exist and its duration is returned.
fn resolve_references(conn: &Connection, barber_id: &str, service_id: &str) -> Result<i64, AppError> {
    if queries::get_barber(conn, barber_id)?.is_none() {
        return Err(AppError::NotFound(format!("barber {barber_id}")));
    }
    let service = queries::get_service(conn, service_id)?
        .ok_or_else(|| AppError::NotFound(format!("service {service_id}")))?;
    Ok(service.duration_minutes)
}

// GET /api/v1/appointments
#[derive(Deserialize)]
pub struct AppointmentsQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<String>,
    pub barber_id: Option<String>,
    pub date: Option<String>,
}

pub async fn list_appointments(
    State(state): State<Arc<AppState>>,
    ValidQuery(query): ValidQuery<AppointmentsQuery>,
) -> Result<Json<Vec<Appointment>>, AppError> {
    let (skip, limit) = Pagination {
        skip: query.skip,
        limit: query.limit,
    }
    .bounds();

    let status = query.status.as_deref().map(parse_status).transpose()?;
    let day = query.date.as_deref().map(parse_date).transpose()?;
    let bounds = day.map(queries::day_bounds);

    let filter = queries::AppointmentFilter {
        status,
        barber_id: query.barber_id.as_deref(),
        from: bounds.map(|(start, _)| start),
        until: bounds.map(|(_, end)| end),
    };

    let appointments = queries::list_appointments(&state.db(), &filter, skip, limit)?;
    Ok(Json(appointments))
}

// GET /api/v1/appointments/:id
pub async fn get_appointment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Appointment>, AppError> {
    let appointment = queries::get_appointment(&state.db(), &id)?.ok_or_else(|| not_found(&id))?;
    Ok(Json(appointment))
}

// POST /api/v1/appointments
#[derive(Deserialize)]
pub struct CreateAppointmentRequest {
    pub client_name: String,
    pub client_phone: Option<String>,
    pub barber_id: String,
    pub service_id: String,
    pub appointment_date: String,
    pub status: Option<String>,
    pub notes: Option<String>,
}

pub async fn create_appointment(
    State(state): State<Arc<AppState>>,
    ValidJson(body): ValidJson<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<Appointment>), AppError> {
    let client_name = require_text("client_name", &body.client_name, 2, 100)?;
    let client_phone = optional_phone("client_phone", body.client_phone)?;
    let notes = optional_notes(body.notes)?;
    let appointment_date = parse_appointment_date(&body.appointment_date)?;

    let status = match body.status.as_deref() {
        None => AppointmentStatus::Pending,
        Some(raw) => match parse_status(raw)? {
            s @ (AppointmentStatus::Pending | AppointmentStatus::Confirmed) => s,
            other => {
                return Err(AppError::Validation(format!(
                    "new appointments must be pending or confirmed, not {other}"
                )))
            }
        },
    };

    let db = state.db();
    let duration_minutes = resolve_references(&db, &body.barber_id, &body.service_id)?;

    scheduling::validate_booking_time(
        &db,
        &state.config.business_hours,
        &body.barber_id,
        appointment_date,
        duration_minutes,
        None,
        state.now(),
    )?;

    let now = queries::now();
    let appointment = Appointment {
        id: uuid::Uuid::new_v4().to_string(),
        client_name,
        client_phone,
        barber_id: body.barber_id,
        service_id: body.service_id,
        appointment_date,
        status,
        notes,
        created_at: now,
        updated_at: now,
    };

    queries::create_appointment(&db, &appointment)?;
    drop(db);

    tracing::info!(
        appointment_id = %appointment.id,
        barber_id = %appointment.barber_id,
        appointment_date = %appointment.appointment_date,
        "appointment booked"
    );

    Ok((StatusCode::CREATED, Json(appointment)))
}

// PUT /api/v1/appointments/:id
#[derive(Deserialize)]
pub struct UpdateAppointmentRequest {
    pub client_name: Option<String>,
    pub client_phone: Option<String>,
    pub barber_id: Option<String>,
    pub service_id: Option<String>,
    pub appointment_date: Option<String>,
    pub status: Option<String>,
    pub notes: Option<String>,
}

pub async fn update_appointment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ValidJson(body): ValidJson<UpdateAppointmentRequest>,
) -> Result<Json<Appointment>, AppError> {
    let db = state.db();
    let current = queries::get_appointment(&db, &id)?.ok_or_else(|| not_found(&id))?;
    let mut updated = current.clone();

    if let Some(name) = &body.client_name {
        updated.client_name = require_text("client_name", name, 2, 100)?;
    }
    if body.client_phone.is_some() {
        updated.client_phone = optional_phone("client_phone", body.client_phone)?;
    }
    if body.notes.is_some() {
        updated.notes = optional_notes(body.notes)?;
    }
    if let Some(barber_id) = body.barber_id {
        updated.barber_id = barber_id;
    }
    if let Some(service_id) = body.service_id {
        updated.service_id = service_id;
    }
    if let Some(raw) = &body.appointment_date {
        updated.appointment_date = parse_appointment_date(raw)?;
    }
    if let Some(raw) = &body.status {
        let next = parse_status(raw)?;
        if !current.status.can_transition_to(next) {
            return Err(AppError::InvalidTransition {
                from: current.status,
                to: next,
            });
        }
        updated.status = next;
    }

    let rescheduled = updated.barber_id != current.barber_id
        || updated.service_id != current.service_id
        || updated.appointment_date != current.appointment_date;

    if rescheduled {
        if current.status.is_terminal() {
            return Err(AppError::Validation(format!(
                "a {} appointment cannot be rescheduled",
                current.status
            )));
        }

        let duration_minutes = resolve_references(&db, &updated.barber_id, &updated.service_id)?;
        if updated.status.is_active() {
            scheduling::validate_booking_time(
                &db,
                &state.config.business_hours,
                &updated.barber_id,
                updated.appointment_date,
                duration_minutes,
                Some(&id),
                state.now(),
            )?;
        } else if updated.status != AppointmentStatus::Cancelled {
            // A completed appointment still occupies its interval.
            scheduling::check_conflict(
                &db,
                &updated.barber_id,
                updated.appointment_date,
                duration_minutes,
                Some(&id),
            )?;
        }
    }

    updated.updated_at = queries::now();
    if !queries::update_appointment(&db, &updated)? {
        return Err(not_found(&id));
    }
    drop(db);

    if rescheduled {
        tracing::info!(
            appointment_id = %id,
            barber_id = %updated.barber_id,
            appointment_date = %updated.appointment_date,
            "appointment rescheduled"
        );
    }

    Ok(Json(updated))
}

// PATCH /api/v1/appointments/:id/status
#[derive(Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

pub async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ValidJson(body): ValidJson<StatusRequest>,
) -> Result<Json<Appointment>, AppError> {
    let next = parse_status(&body.status)?;

    let db = state.db();
    let current = queries::get_appointment(&db, &id)?.ok_or_else(|| not_found(&id))?;

    if !current.status.can_transition_to(next) {
        return Err(AppError::InvalidTransition {
            from: current.status,
            to: next,
        });
    }
    if current.status == next {
        return Ok(Json(current));
    }

    if !queries::update_appointment_status(&db, &id, next)? {
        return Err(not_found(&id));
    }
    let appointment = queries::get_appointment(&db, &id)?.ok_or_else(|| not_found(&id))?;
    drop(db);

    tracing::info!(appointment_id = %id, from = %current.status, to = %next, "appointment status changed");
    Ok(Json(appointment))
}

// DELETE /api/v1/appointments/:id
//
// Soft delete: the appointment is cancelled and kept for history.
pub async fn cancel_appointment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Appointment>, AppError> {
    let db = state.db();
    let current = queries::get_appointment(&db, &id)?.ok_or_else(|| not_found(&id))?;

    match current.status {
        AppointmentStatus::Cancelled => return Ok(Json(current)),
        AppointmentStatus::Completed => {
            return Err(AppError::InvalidTransition {
                from: current.status,
                to: AppointmentStatus::Cancelled,
            })
        }
        AppointmentStatus::Pending | AppointmentStatus::Confirmed => {}
    }

    let appointment = queries::soft_delete_appointment(&db, &id)?.ok_or_else(|| not_found(&id))?;
    drop(db);

    tracing::info!(appointment_id = %id, "appointment cancelled");
    Ok(Json(appointment))
}
