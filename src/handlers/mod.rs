pub mod appointments;
pub mod barbers;
pub mod extract;
pub mod health;
pub mod services;

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use serde::Deserialize;

use crate::errors::AppError;

pub const DEFAULT_LIMIT: i64 = 100;
pub const MAX_LIMIT: i64 = 500;

#[derive(Debug, Default, Deserialize)]
pub struct Pagination {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

impl Pagination {
    /// `(skip, limit)` clamped to sane bounds.
    pub fn bounds(&self) -> (i64, i64) {
        let skip = self.skip.unwrap_or(0).max(0);
        let limit = self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        (skip, limit)
    }
}

/// Trimmed text whose length (in characters) falls within `min..=max`.
pub fn require_text(field: &str, value: &str, min: usize, max: usize) -> Result<String, AppError> {
    let value = value.trim();
    let len = value.chars().count();
    if len < min || len > max {
        return Err(AppError::Validation(format!(
            "{field} must be between {min} and {max} characters"
        )));
    }
    Ok(value.to_string())
}

/// Empty strings become `None`; anything else must look like a phone number.
pub fn optional_phone(field: &str, value: Option<String>) -> Result<Option<String>, AppError> {
    let Some(value) = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    let digits = value.chars().filter(char::is_ascii_digit).count();
    let allowed = value
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')' | '.'));
    if !allowed || digits < 6 || value.len() > 20 {
        return Err(AppError::Validation(format!("{field} is not a valid phone number")));
    }
    Ok(Some(value))
}

pub fn optional_notes(value: Option<String>) -> Result<Option<String>, AppError> {
    match value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        Some(notes) if notes.chars().count() > 1000 => Err(AppError::Validation(
            "notes must be at most 1000 characters".to_string(),
        )),
        other => Ok(other),
    }
}

/// Stored timestamps compare as text, which only orders correctly for
/// four-digit years.
const YEARS: std::ops::RangeInclusive<i32> = 1000..=9999;

fn check_year(field: &str, date: NaiveDate) -> Result<(), AppError> {
    if !YEARS.contains(&date.year()) {
        return Err(AppError::Validation(format!(
            "{field} year must be between {} and {}",
            YEARS.start(),
            YEARS.end()
        )));
    }
    Ok(())
}

pub fn parse_date(value: &str) -> Result<NaiveDate, AppError> {
    let date = NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        AppError::Validation(format!("invalid date '{value}', expected YYYY-MM-DD"))
    })?;
    check_year("date", date)?;
    Ok(date)
}

/// Appointment start times are minute precision: `YYYY-MM-DDTHH:MM`, with an
/// optional `:00` seconds suffix. A space may replace the `T`.
pub fn parse_appointment_date(value: &str) -> Result<NaiveDateTime, AppError> {
    let value = value.trim();
    let parsed = ["%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .ok_or_else(|| {
            AppError::Validation(format!(
                "invalid appointment_date '{value}', expected YYYY-MM-DDTHH:MM"
            ))
        })?;

    if parsed.second() != 0 || parsed.nanosecond() != 0 {
        return Err(AppError::Validation(
            "appointment_date must be a whole minute".to_string(),
        ));
    }
    check_year("appointment_date", parsed.date())?;
    Ok(parsed)
}
