use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A bookable service. Its duration decides how long an appointment blocks
/// the barber's calendar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: String,
    pub name: String,
    pub duration_minutes: i64,
    pub price: f64,
    pub created_at: NaiveDateTime,
}
