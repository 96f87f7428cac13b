use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::models::AppointmentStatus;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("{0}")]
    Validation(String),

    #[error("appointments cannot be booked in the past: {0}")]
    PastDate(String),

    #[error("that time is outside business hours ({hours})")]
    OutsideBusinessHours { hours: String },

    #[error("the barber already has an appointment at that time")]
    Conflict { appointment_id: Option<String> },

    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("{0} is still referenced by appointments")]
    InUse(String),

    #[error("cannot change appointment status from {from} to {to}")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("not found: {0}")]
    NotFound(String),
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Database(_) => "database_error",
            AppError::Validation(_) => "validation_error",
            AppError::PastDate(_) => "past_date",
            AppError::OutsideBusinessHours { .. } => "outside_business_hours",
            AppError::Conflict { .. } => "slot_unavailable",
            AppError::AlreadyExists(_) => "already_exists",
            AppError::InUse(_) => "in_use",
            AppError::InvalidTransition { .. } => "invalid_status_transition",
            AppError::NotFound(_) => "not_found",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Validation(_)
            | AppError::PastDate(_)
            | AppError::OutsideBusinessHours { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Conflict { .. }
            | AppError::AlreadyExists(_)
            | AppError::InUse(_)
            | AppError::InvalidTransition { .. } => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if let AppError::Database(e) = &self {
            tracing::error!(error = %e, "database failure");
        }

        let mut body = serde_json::json!({
            "error": self.code(),
            "message": self.to_string(),
        });
        if let AppError::Conflict {
            appointment_id: Some(id),
        } = &self
        {
            body["conflicting_appointment_id"] = serde_json::Value::String(id.clone());
        }

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_conflict_response_carries_code_and_id() {
        let err = AppError::Conflict {
            appointment_id: Some("appt-1".to_string()),
        };
        let res = err.into_response();
        assert_eq!(res.status(), StatusCode::CONFLICT);

        let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "slot_unavailable");
        assert_eq!(json["conflicting_appointment_id"], "appt-1");
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppError::PastDate("2020-01-01".into()).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::NotFound("barber x".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Database(rusqlite::Error::QueryReturnedNoRows).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
