use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, SubsecRound, Utc};
use rusqlite::types::ToSql;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};

use crate::errors::AppError;
use crate::models::{Appointment, AppointmentStatus, Barber, BookedSlot, Service};

const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn format_ts(dt: &NaiveDateTime) -> String {
    dt.format(TS_FORMAT).to_string()
}

fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, TS_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Current UTC time at the precision stored in the database (whole seconds).
pub fn now() -> NaiveDateTime {
    Utc::now().naive_utc().trunc_subsecs(0)
}

/// First and last stored second of `date`, both inclusive.
pub fn day_bounds(date: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
    let start = date.and_time(NaiveTime::MIN);
    (start, start + Duration::days(1) - Duration::seconds(1))
}

/// Extended result code of a constraint violation, if `err` is one.
fn constraint_violation(err: &rusqlite::Error) -> Option<i32> {
    match err {
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation => {
            Some(e.extended_code)
        }
        _ => None,
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        constraint_violation(err),
        Some(rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
    )
}

fn is_foreign_key_violation(err: &rusqlite::Error) -> bool {
    constraint_violation(err) == Some(rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY)
}

pub fn ping(conn: &Connection) -> Result<(), AppError> {
    conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
    Ok(())
}

// ── Barbers ──

fn parse_barber_row(row: &Row<'_>) -> rusqlite::Result<Barber> {
    let created_at: String = row.get(3)?;
    Ok(Barber {
        id: row.get(0)?,
        name: row.get(1)?,
        phone: row.get(2)?,
        created_at: parse_ts(3, &created_at)?,
    })
}

pub fn create_barber(conn: &Connection, barber: &Barber) -> Result<(), AppError> {
    conn.execute(
        "INSERT INTO barbers (id, name, phone, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![barber.id, barber.name, barber.phone, format_ts(&barber.created_at)],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::AlreadyExists(format!("barber named '{}'", barber.name))
        } else {
            e.into()
        }
    })?;
    Ok(())
}

pub fn get_barber(conn: &Connection, id: &str) -> Result<Option<Barber>, AppError> {
    let barber = conn
        .query_row(
            "SELECT id, name, phone, created_at FROM barbers WHERE id = ?1",
            params![id],
            parse_barber_row,
        )
        .optional()?;
    Ok(barber)
}

pub fn list_barbers(conn: &Connection, skip: i64, limit: i64) -> Result<Vec<Barber>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, phone, created_at FROM barbers ORDER BY name ASC LIMIT ?1 OFFSET ?2",
    )?;
    let rows = stmt.query_map(params![limit, skip], parse_barber_row)?;

    let mut barbers = vec![];
    for row in rows {
        barbers.push(row?);
    }
    Ok(barbers)
}

pub fn update_barber(conn: &Connection, barber: &Barber) -> Result<bool, AppError> {
    let count = conn
        .execute(
            "UPDATE barbers SET name = ?1, phone = ?2 WHERE id = ?3",
            params![barber.name, barber.phone, barber.id],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::AlreadyExists(format!("barber named '{}'", barber.name))
            } else {
                e.into()
            }
        })?;
    Ok(count > 0)
}

pub fn delete_barber(conn: &Connection, id: &str) -> Result<bool, AppError> {
    let count = conn
        .execute("DELETE FROM barbers WHERE id = ?1", params![id])
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                AppError::InUse(format!("barber {id}"))
            } else {
                e.into()
            }
        })?;
    Ok(count > 0)
}

// ── Services ──

fn parse_service_row(row: &Row<'_>) -> rusqlite::Result<Service> {
    let created_at: String = row.get(4)?;
    Ok(Service {
        id: row.get(0)?,
        name: row.get(1)?,
        duration_minutes: row.get(2)?,
        price: row.get(3)?,
        created_at: parse_ts(4, &created_at)?,
    })
}

pub fn create_service(conn: &Connection, service: &Service) -> Result<(), AppError> {
    conn.execute(
        "INSERT INTO services (id, name, duration_minutes, price, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            service.id,
            service.name,
            service.duration_minutes,
            service.price,
            format_ts(&service.created_at),
        ],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::AlreadyExists(format!("service named '{}'", service.name))
        } else {
            e.into()
        }
    })?;
    Ok(())
}

pub fn get_service(conn: &Connection, id: &str) -> Result<Option<Service>, AppError> {
    let service = conn
        .query_row(
            "SELECT id, name, duration_minutes, price, created_at FROM services WHERE id = ?1",
            params![id],
            parse_service_row,
        )
        .optional()?;
    Ok(service)
}

pub fn list_services(conn: &Connection, skip: i64, limit: i64) -> Result<Vec<Service>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, duration_minutes, price, created_at FROM services
         ORDER BY name ASC LIMIT ?1 OFFSET ?2",
    )?;
    let rows = stmt.query_map(params![limit, skip], parse_service_row)?;

    let mut services = vec![];
    for row in rows {
        services.push(row?);
    }
    Ok(services)
}

pub fn update_service(conn: &Connection, service: &Service) -> Result<bool, AppError> {
    let count = conn
        .execute(
            "UPDATE services SET name = ?1, duration_minutes = ?2, price = ?3 WHERE id = ?4",
            params![service.name, service.duration_minutes, service.price, service.id],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::AlreadyExists(format!("service named '{}'", service.name))
            } else {
                e.into()
            }
        })?;
    Ok(count > 0)
}

pub fn delete_service(conn: &Connection, id: &str) -> Result<bool, AppError> {
    let count = conn
        .execute("DELETE FROM services WHERE id = ?1", params![id])
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                AppError::InUse(format!("service {id}"))
            } else {
                e.into()
            }
        })?;
    Ok(count > 0)
}

// ── Appointments ──

const APPOINTMENT_COLUMNS: &str = "id, client_name, client_phone, barber_id, service_id, \
     appointment_date, status, notes, created_at, updated_at";

fn parse_appointment_row(row: &Row<'_>) -> rusqlite::Result<Appointment> {
    let appointment_date: String = row.get(5)?;
    let status: String = row.get(6)?;
    let created_at: String = row.get(8)?;
    let updated_at: String = row.get(9)?;

    let status = AppointmentStatus::parse(&status).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            6,
            rusqlite::types::Type::Text,
            format!("unknown appointment status: {status}").into(),
        )
    })?;

    Ok(Appointment {
        id: row.get(0)?,
        client_name: row.get(1)?,
        client_phone: row.get(2)?,
        barber_id: row.get(3)?,
        service_id: row.get(4)?,
        appointment_date: parse_ts(5, &appointment_date)?,
        status,
        notes: row.get(7)?,
        created_at: parse_ts(8, &created_at)?,
        updated_at: parse_ts(9, &updated_at)?,
    })
}

/// Map a write failure on the appointments table. A unique violation means
/// another active appointment already holds this (barber, start) pair, which
/// is the same outcome as an application-level conflict.
fn appointment_write_error(conn: &Connection, appointment: &Appointment, e: rusqlite::Error) -> AppError {
    if is_unique_violation(&e) {
        let existing = find_active_at(
            conn,
            &appointment.barber_id,
            &appointment.appointment_date,
            Some(&appointment.id),
        )
        .ok()
        .flatten();
        tracing::warn!(
            barber_id = %appointment.barber_id,
            appointment_date = %appointment.appointment_date,
            "double booking rejected by unique index"
        );
        return AppError::Conflict {
            appointment_id: existing,
        };
    }
    if is_foreign_key_violation(&e) {
        return AppError::NotFound(format!(
            "barber {} or service {}",
            appointment.barber_id, appointment.service_id
        ));
    }
    e.into()
}

pub fn create_appointment(conn: &Connection, appointment: &Appointment) -> Result<(), AppError> {
    conn.execute(
        "INSERT INTO appointments (id, client_name, client_phone, barber_id, service_id, appointment_date, status, notes, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            appointment.id,
            appointment.client_name,
            appointment.client_phone,
            appointment.barber_id,
            appointment.service_id,
            format_ts(&appointment.appointment_date),
            appointment.status.as_str(),
            appointment.notes,
            format_ts(&appointment.created_at),
            format_ts(&appointment.updated_at),
        ],
    )
    .map_err(|e| appointment_write_error(conn, appointment, e))?;
    Ok(())
}

pub fn get_appointment(conn: &Connection, id: &str) -> Result<Option<Appointment>, AppError> {
    let appointment = conn
        .query_row(
            &format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = ?1"),
            params![id],
            parse_appointment_row,
        )
        .optional()?;
    Ok(appointment)
}

/// Id of the active appointment starting exactly at `start` for the barber.
pub fn find_active_at(
    conn: &Connection,
    barber_id: &str,
    start: &NaiveDateTime,
    exclude_id: Option<&str>,
) -> Result<Option<String>, AppError> {
    let id = conn
        .query_row(
            "SELECT id FROM appointments
             WHERE barber_id = ?1 AND appointment_date = ?2 AND status != 'cancelled'
               AND id != COALESCE(?3, '')
             LIMIT 1",
            params![barber_id, format_ts(start), exclude_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

#[derive(Debug, Default, Clone)]
pub struct AppointmentFilter<'a> {
    pub status: Option<AppointmentStatus>,
    pub barber_id: Option<&'a str>,
    pub from: Option<NaiveDateTime>,
    /// Inclusive upper bound.
    pub until: Option<NaiveDateTime>,
}

pub fn list_appointments(
    conn: &Connection,
    filter: &AppointmentFilter<'_>,
    skip: i64,
    limit: i64,
) -> Result<Vec<Appointment>, AppError> {
    let mut clauses: Vec<&str> = vec![];
    let mut values: Vec<Box<dyn ToSql>> = vec![];

    if let Some(status) = filter.status {
        clauses.push("status = ?");
        values.push(Box::new(status.as_str()));
    }
    if let Some(barber_id) = filter.barber_id {
        clauses.push("barber_id = ?");
        values.push(Box::new(barber_id.to_string()));
    }
    if let Some(from) = &filter.from {
        clauses.push("appointment_date >= ?");
        values.push(Box::new(format_ts(from)));
    }
    if let Some(until) = &filter.until {
        clauses.push("appointment_date <= ?");
        values.push(Box::new(format_ts(until)));
    }

    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    let sql = format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments {where_sql}
         ORDER BY appointment_date ASC, created_at ASC LIMIT ? OFFSET ?"
    );
    values.push(Box::new(limit));
    values.push(Box::new(skip));

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn ToSql> = values.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), parse_appointment_row)?;

    let mut appointments = vec![];
    for row in rows {
        appointments.push(row?);
    }
    Ok(appointments)
}

/// Active appointments of a barber starting in `[start, end]`, each with the
/// duration of its service, ordered by start time.
pub fn get_appointments_for_barber(
    conn: &Connection,
    barber_id: &str,
    start: &NaiveDateTime,
    end: &NaiveDateTime,
) -> Result<Vec<BookedSlot>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT a.id, a.appointment_date, s.duration_minutes
         FROM appointments a
         JOIN services s ON s.id = a.service_id
         WHERE a.barber_id = ?1 AND a.appointment_date >= ?2 AND a.appointment_date <= ?3
           AND a.status != 'cancelled'
         ORDER BY a.appointment_date ASC",
    )?;

    let rows = stmt.query_map(params![barber_id, format_ts(start), format_ts(end)], |row| {
        let start: String = row.get(1)?;
        Ok(BookedSlot {
            appointment_id: row.get(0)?,
            start: parse_ts(1, &start)?,
            duration_minutes: row.get(2)?,
        })
    })?;

    let mut slots = vec![];
    for row in rows {
        slots.push(row?);
    }
    Ok(slots)
}

pub fn update_appointment(conn: &Connection, appointment: &Appointment) -> Result<bool, AppError> {
    let count = conn
        .execute(
            "UPDATE appointments SET client_name = ?1, client_phone = ?2, barber_id = ?3, service_id = ?4,
                 appointment_date = ?5, status = ?6, notes = ?7, updated_at = ?8
             WHERE id = ?9",
            params![
                appointment.client_name,
                appointment.client_phone,
                appointment.barber_id,
                appointment.service_id,
                format_ts(&appointment.appointment_date),
                appointment.status.as_str(),
                appointment.notes,
                format_ts(&appointment.updated_at),
                appointment.id,
            ],
        )
        .map_err(|e| appointment_write_error(conn, appointment, e))?;
    Ok(count > 0)
}

pub fn update_appointment_status(
    conn: &Connection,
    id: &str,
    status: AppointmentStatus,
) -> Result<bool, AppError> {
    let count = conn.execute(
        "UPDATE appointments SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), format_ts(&now()), id],
    )?;
    Ok(count > 0)
}

/// Cancel an appointment in place and return the updated row. The row is
/// never removed.
pub fn soft_delete_appointment(conn: &Connection, id: &str) -> Result<Option<Appointment>, AppError> {
    if !update_appointment_status(conn, id, AppointmentStatus::Cancelled)? {
        return Ok(None);
    }
    get_appointment(conn, id)
}
