use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};

pub const DEFAULT_OPEN: &str = "09:00";
pub const DEFAULT_CLOSE: &str = "20:00";
pub const DEFAULT_SLOT_MINUTES: i64 = 30;

/// Daily opening window of the shop. The same window applies to every day
/// that is not listed in `closed_days`.
#[derive(Debug, Clone, PartialEq)]
pub struct BusinessHours {
    pub open: NaiveTime,
    pub close: NaiveTime,
    pub slot_minutes: i64,
    pub closed_days: Vec<Weekday>,
}

impl Default for BusinessHours {
    fn default() -> Self {
        Self {
            open: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN),
            close: NaiveTime::from_hms_opt(20, 0, 0).unwrap_or(NaiveTime::MIN),
            slot_minutes: DEFAULT_SLOT_MINUTES,
            closed_days: Vec::new(),
        }
    }
}

impl BusinessHours {
    pub fn new(
        open: NaiveTime,
        close: NaiveTime,
        slot_minutes: i64,
        closed_days: Vec<Weekday>,
    ) -> anyhow::Result<Self> {
        anyhow::ensure!(open < close, "opening time {open} must be before closing time {close}");
        anyhow::ensure!(slot_minutes > 0, "slot length must be positive, got {slot_minutes}");
        let window = (close - open).num_minutes();
        anyhow::ensure!(
            slot_minutes <= window,
            "slot length {slot_minutes} exceeds the {window}-minute opening window"
        );
        Ok(Self {
            open,
            close,
            slot_minutes,
            closed_days,
        })
    }

    /// Parse the textual form used in configuration: `HH:MM` times and a
    /// comma-separated list of weekday abbreviations.
    pub fn parse(open: &str, close: &str, slot_minutes: i64, closed_days: &str) -> anyhow::Result<Self> {
        let days = closed_days
            .split(',')
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(parse_weekday)
            .collect::<anyhow::Result<Vec<_>>>()?;
        Self::new(parse_time(open)?, parse_time(close)?, slot_minutes, days)
    }

    pub fn is_open_on(&self, date: NaiveDate) -> bool {
        !self.closed_days.contains(&date.weekday())
    }

    /// Whether `[start, start + duration)` fits inside the opening window of
    /// its own day.
    pub fn contains(&self, start: &NaiveDateTime, duration_minutes: i64) -> bool {
        let date = start.date();
        if !self.is_open_on(date) {
            return false;
        }
        let end = *start + Duration::minutes(duration_minutes);
        *start >= date.and_time(self.open) && end <= date.and_time(self.close)
    }

    /// Every slot boundary of `date` at which a service of `duration_minutes`
    /// can start and still finish by closing time.
    pub fn slot_starts(&self, date: NaiveDate, duration_minutes: i64) -> Vec<NaiveDateTime> {
        if !self.is_open_on(date) {
            return Vec::new();
        }

        let closing = date.and_time(self.close);
        let step = Duration::minutes(self.slot_minutes);
        let length = Duration::minutes(duration_minutes);

        let mut starts = Vec::new();
        let mut cursor = date.and_time(self.open);
        while cursor + length <= closing {
            starts.push(cursor);
            cursor += step;
        }
        starts
    }

    pub fn to_human_readable(&self) -> String {
        let window = format!("{}-{}", self.open.format("%H:%M"), self.close.format("%H:%M"));
        if self.closed_days.is_empty() {
            return window;
        }
        let closed = self
            .closed_days
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        format!("{window} (closed {closed})")
    }
}

pub fn parse_weekday(s: &str) -> anyhow::Result<Weekday> {
    s.parse::<Weekday>()
        .map_err(|_| anyhow::anyhow!("invalid weekday: {s}"))
}

pub fn parse_time(s: &str) -> anyhow::Result<NaiveTime> {
    let (hour, minute) = s
        .split_once(':')
        .ok_or_else(|| anyhow::anyhow!("invalid time format: {s}"))?;
    let hour: u32 = hour
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid hour in: {s}"))?;
    let minute: u32 = minute
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid minute in: {s}"))?;
    NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(|| anyhow::anyhow!("time out of range: {s}"))
}
