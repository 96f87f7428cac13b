use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use rusqlite::Connection;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{BookedSlot, BusinessHours};

/// Half-open interval overlap: `[a_start, a_end)` and `[b_start, b_end)`.
/// Intervals that merely touch do not overlap.
pub fn overlaps(
    a_start: NaiveDateTime,
    a_end: NaiveDateTime,
    b_start: NaiveDateTime,
    b_end: NaiveDateTime,
) -> bool {
    a_start < b_end && b_start < a_end
}

/// First booked slot that collides with `[start, start + duration)`.
pub fn find_conflict<'a>(
    booked: &'a [BookedSlot],
    start: NaiveDateTime,
    duration_minutes: i64,
    exclude_id: Option<&str>,
) -> Option<&'a BookedSlot> {
    let end = start + Duration::minutes(duration_minutes);
    booked
        .iter()
        .filter(|slot| Some(slot.appointment_id.as_str()) != exclude_id)
        .find(|slot| overlaps(start, end, slot.start, slot.end()))
}

/// Free slot starts of `date`, earliest first. Starts before `now` are dropped
/// so today only offers what is still ahead.
pub fn free_slots(
    hours: &BusinessHours,
    date: NaiveDate,
    duration_minutes: i64,
    booked: &[BookedSlot],
    now: NaiveDateTime,
) -> Vec<NaiveTime> {
    hours
        .slot_starts(date, duration_minutes)
        .into_iter()
        .filter(|start| *start >= now)
        .filter(|start| find_conflict(booked, *start, duration_minutes, None).is_none())
        .map(|start| start.time())
        .collect()
}

fn booked_on(conn: &Connection, barber_id: &str, date: NaiveDate) -> Result<Vec<BookedSlot>, AppError> {
    let (day_start, day_end) = queries::day_bounds(date);
    queries::get_appointments_for_barber(conn, barber_id, &day_start, &day_end)
}

/// Reject `[start, start + duration)` if it overlaps any active appointment
/// of the barber on that day. `exclude_id` skips the appointment being moved.
pub fn check_conflict(
    conn: &Connection,
    barber_id: &str,
    start: NaiveDateTime,
    duration_minutes: i64,
    exclude_id: Option<&str>,
) -> Result<(), AppError> {
    let booked = booked_on(conn, barber_id, start.date())?;

    match find_conflict(&booked, start, duration_minutes, exclude_id) {
        Some(slot) => {
            tracing::warn!(
                barber_id,
                requested = %start,
                conflicting = %slot.appointment_id,
                "slot already booked"
            );
            Err(AppError::Conflict {
                appointment_id: Some(slot.appointment_id.clone()),
            })
        }
        None => Ok(()),
    }
}

pub fn compute_available_slots(
    conn: &Connection,
    hours: &BusinessHours,
    barber_id: &str,
    date: NaiveDate,
    duration_minutes: i64,
    now: NaiveDateTime,
) -> Result<Vec<NaiveTime>, AppError> {
    if date < now.date() {
        return Err(AppError::PastDate(date.format("%Y-%m-%d").to_string()));
    }

    let booked = booked_on(conn, barber_id, date)?;
    Ok(free_slots(hours, date, duration_minutes, &booked, now))
}

/// Full admission check for a booking or a reschedule: not in the past,
/// inside business hours, and free for the barber.
pub fn validate_booking_time(
    conn: &Connection,
    hours: &BusinessHours,
    barber_id: &str,
    start: NaiveDateTime,
    duration_minutes: i64,
    exclude_id: Option<&str>,
    now: NaiveDateTime,
) -> Result<(), AppError> {
    if start < now {
        return Err(AppError::PastDate(start.format("%Y-%m-%d %H:%M").to_string()));
    }

    if !hours.contains(&start, duration_minutes) {
        return Err(AppError::OutsideBusinessHours {
            hours: hours.to_human_readable(),
        });
    }

    check_conflict(conn, barber_id, start, duration_minutes, exclude_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::{Appointment, AppointmentStatus, Barber, Service};

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn slot(id: &str, start: &str, duration_minutes: i64) -> BookedSlot {
        BookedSlot {
            appointment_id: id.to_string(),
            start: dt(start),
            duration_minutes,
        }
    }

    fn morning_before() -> NaiveDateTime {
        dt("2026-02-01 08:00")
    }

    fn setup_db() -> Connection {
        let conn = db::init_db(":memory:").unwrap();
        let now = queries::now();
        for (id, name) in [("barber-a", "Alex"), ("barber-b", "Bruno")] {
            queries::create_barber(
                &conn,
                &Barber {
                    id: id.to_string(),
                    name: name.to_string(),
                    phone: None,
                    created_at: now,
                },
            )
            .unwrap();
        }
        queries::create_service(
            &conn,
            &Service {
                id: "cut".to_string(),
                name: "Haircut".to_string(),
                duration_minutes: 30,
                price: 20.0,
                created_at: now,
            },
        )
        .unwrap();
        conn
    }

    fn book(conn: &Connection, id: &str, barber_id: &str, start: &str) {
        let now = queries::now();
        queries::create_appointment(
            conn,
            &Appointment {
                id: id.to_string(),
                client_name: "Client".to_string(),
                client_phone: None,
                barber_id: barber_id.to_string(),
                service_id: "cut".to_string(),
                appointment_date: dt(start),
                status: AppointmentStatus::Confirmed,
                notes: None,
                created_at: now,
                updated_at: now,
            },
        )
        .unwrap();
    }

    #[test]
    fn test_disjoint_intervals_do_not_conflict() {
        let booked = [slot("a", "2026-02-15 10:00", 30)];
        assert!(find_conflict(&booked, dt("2026-02-15 11:00"), 30, None).is_none());
        assert!(find_conflict(&booked, dt("2026-02-15 09:00"), 30, None).is_none());
    }

    #[test]
    fn test_touching_intervals_do_not_conflict() {
        let booked = [slot("a", "2026-02-15 10:00", 30)];
        assert!(find_conflict(&booked, dt("2026-02-15 10:30"), 30, None).is_none());
        assert!(find_conflict(&booked, dt("2026-02-15 09:30"), 30, None).is_none());
    }

    #[test]
    fn test_containment_conflicts_both_ways() {
        let booked = [slot("long", "2026-02-15 10:00", 120)];
        let hit = find_conflict(&booked, dt("2026-02-15 10:30"), 30, None);
        assert_eq!(hit.map(|s| s.appointment_id.as_str()), Some("long"));

        let booked = [slot("short", "2026-02-15 10:30", 15)];
        assert!(find_conflict(&booked, dt("2026-02-15 10:00"), 90, None).is_some());
    }

    #[test]
    fn test_partial_overlap_conflicts() {
        let booked = [slot("a", "2026-02-15 14:00", 30)];
        assert!(find_conflict(&booked, dt("2026-02-15 14:15"), 30, None).is_some());
        assert!(find_conflict(&booked, dt("2026-02-15 13:45"), 30, None).is_some());
    }

    #[test]
    fn test_excluded_appointment_is_ignored() {
        let booked = [slot("self", "2026-02-15 14:00", 30)];
        assert!(find_conflict(&booked, dt("2026-02-15 14:15"), 30, Some("self")).is_none());
    }

    #[test]
    fn test_free_day_offers_every_boundary() {
        let hours = BusinessHours::default();
        let slots = free_slots(&hours, date("2026-02-16"), 30, &[], morning_before());
        assert_eq!(slots.len(), 22);
        assert_eq!(slots[0], NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        assert_eq!(slots[21], NaiveTime::from_hms_opt(19, 30, 0).unwrap());

        let hour_long = free_slots(&hours, date("2026-02-16"), 60, &[], morning_before());
        assert_eq!(hour_long.len(), 21);
        assert_eq!(hour_long[20], NaiveTime::from_hms_opt(19, 0, 0).unwrap());
    }

    #[test]
    fn test_free_slots_never_overlap_bookings() {
        let hours = BusinessHours::default();
        let booked = [
            slot("a", "2026-02-16 10:00", 45),
            slot("b", "2026-02-16 15:15", 30),
        ];
        let slots = free_slots(&hours, date("2026-02-16"), 30, &booked, morning_before());

        for t in &slots {
            let start = date("2026-02-16").and_time(*t);
            let end = start + Duration::minutes(30);
            for b in &booked {
                assert!(!overlaps(start, end, b.start, b.end()), "{t} overlaps {}", b.appointment_id);
            }
        }
        let taken: Vec<_> = ["10:00", "10:30", "15:00", "15:30"]
            .iter()
            .map(|s| NaiveTime::parse_from_str(s, "%H:%M").unwrap())
            .collect();
        for t in taken {
            assert!(!slots.contains(&t));
        }
        assert!(slots.contains(&NaiveTime::from_hms_opt(11, 0, 0).unwrap()));
        assert!(slots.contains(&NaiveTime::from_hms_opt(16, 0, 0).unwrap()));
    }

    #[test]
    fn test_today_drops_elapsed_slots() {
        let hours = BusinessHours::default();
        let slots = free_slots(&hours, date("2026-02-16"), 30, &[], dt("2026-02-16 18:10"));
        let labels: Vec<_> = slots.iter().map(|t| t.format("%H:%M").to_string()).collect();
        assert_eq!(labels, vec!["18:30", "19:00", "19:30"]);
    }

    #[test]
    fn test_available_slots_rejects_past_date() {
        let conn = setup_db();
        let hours = BusinessHours::default();
        let result = compute_available_slots(
            &conn,
            &hours,
            "barber-a",
            date("2026-01-31"),
            30,
            morning_before(),
        );
        assert!(matches!(result, Err(AppError::PastDate(_))));
    }

    #[test]
    fn test_cancelling_frees_the_slot() {
        let conn = setup_db();
        let hours = BusinessHours::default();
        book(&conn, "a1", "barber-a", "2026-02-15 14:00");
        let fourteen = NaiveTime::from_hms_opt(14, 0, 0).unwrap();

        let before = compute_available_slots(&conn, &hours, "barber-a", date("2026-02-15"), 30, morning_before())
            .unwrap();
        assert!(!before.contains(&fourteen));

        queries::soft_delete_appointment(&conn, "a1").unwrap();

        let after = compute_available_slots(&conn, &hours, "barber-a", date("2026-02-15"), 30, morning_before())
            .unwrap();
        assert!(after.contains(&fourteen));
        assert_eq!(after.len(), 22);
    }

    #[test]
    fn test_booking_scenario_across_barbers() {
        let conn = setup_db();
        let hours = BusinessHours::default();
        book(&conn, "a1", "barber-a", "2026-02-15 14:00");

        let overlapping =
            validate_booking_time(&conn, &hours, "barber-a", dt("2026-02-15 14:15"), 30, None, morning_before());
        match overlapping {
            Err(AppError::Conflict { appointment_id }) => assert_eq!(appointment_id.as_deref(), Some("a1")),
            other => panic!("expected conflict, got {other:?}"),
        }

        assert!(
            validate_booking_time(&conn, &hours, "barber-a", dt("2026-02-15 14:30"), 30, None, morning_before())
                .is_ok()
        );
        assert!(
            validate_booking_time(&conn, &hours, "barber-b", dt("2026-02-15 14:00"), 30, None, morning_before())
                .is_ok()
        );
    }

    #[test]
    fn test_rescheduling_ignores_own_slot() {
        let conn = setup_db();
        book(&conn, "a1", "barber-a", "2026-02-15 14:00");
        assert!(check_conflict(&conn, "barber-a", dt("2026-02-15 14:15"), 30, Some("a1")).is_ok());
    }

    #[test]
    fn test_last_representable_day_still_sees_its_bookings() {
        let conn = setup_db();
        let hours = BusinessHours::default();
        book(&conn, "a1", "barber-a", "9999-12-31 14:00");

        let result = check_conflict(&conn, "barber-a", dt("9999-12-31 14:15"), 30, None);
        assert!(matches!(result, Err(AppError::Conflict { .. })));

        let slots = compute_available_slots(&conn, &hours, "barber-a", date("9999-12-31"), 30, morning_before())
            .unwrap();
        assert!(!slots.contains(&NaiveTime::from_hms_opt(14, 0, 0).unwrap()));
        assert_eq!(slots.len(), 21);
    }

    #[test]
    fn test_past_time_is_rejected_before_conflict_check() {
        let conn = setup_db();
        let hours = BusinessHours::default();
        let result =
            validate_booking_time(&conn, &hours, "barber-a", dt("2026-01-15 10:00"), 30, None, morning_before());
        assert!(matches!(result, Err(AppError::PastDate(_))));
    }

    #[test]
    fn test_outside_business_hours() {
        let conn = setup_db();
        let hours = BusinessHours::default();
        for start in ["2026-02-15 08:30", "2026-02-15 20:00", "2026-02-15 19:45"] {
            let result = validate_booking_time(&conn, &hours, "barber-a", dt(start), 30, None, morning_before());
            assert!(
                matches!(result, Err(AppError::OutsideBusinessHours { .. })),
                "{start} should be outside business hours"
            );
        }
    }
}
