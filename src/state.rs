use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::NaiveDateTime;
use rusqlite::Connection;

use crate::config::AppConfig;

/// Source of the current shop-local time. Swappable so tests can pin "now".
pub type Clock = fn() -> NaiveDateTime;

pub fn local_clock() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub clock: Clock,
}

impl AppState {
    pub fn db(&self) -> MutexGuard<'_, Connection> {
        // Each statement commits on its own, so a poisoned lock still guards
        // a consistent connection.
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn now(&self) -> NaiveDateTime {
        (self.clock)()
    }
}
