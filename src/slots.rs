use chrono::{NaiveDateTime, NaiveTime};

use crate::errors::EngineError;

pub const RESERVATION_LOOKAHEAD_HOURS: i64 = 24;

/// A bookable gap in a room's schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

/// Half-open interval overlap: `[a_start, a_end)` vs `[b_start, b_end)`.
/// An end equal to the other's start does not overlap, so back-to-back
/// bookings are legal.
pub fn overlaps(
    a_start: NaiveDateTime,
    a_end: NaiveDateTime,
    b_start: NaiveDateTime,
    b_end: NaiveDateTime,
) -> bool {
    a_start < b_end && b_start < a_end
}

pub fn validate_time_range(
    start: NaiveDateTime,
    end: NaiveDateTime,
    now: NaiveDateTime,
) -> Result<(), EngineError> {
    if start >= end {
        return Err(EngineError::InvalidRange);
    }
    if start < now {
        return Err(EngineError::PastReservation);
    }
    Ok(())
}

/// Rooms may restrict the time of day reservations can occupy. Each bound
/// applies independently; a room with neither bound is unrestricted.
pub fn check_booking_window(
    booking_start: Option<NaiveTime>,
    booking_end: Option<NaiveTime>,
    start: NaiveDateTime,
    end: NaiveDateTime,
) -> Result<(), EngineError> {
    if let Some(earliest) = booking_start {
        if start.time() < earliest {
            return Err(EngineError::OutsideBookingHours);
        }
    }
    if let Some(latest) = booking_end {
        if end.time() > latest {
            return Err(EngineError::OutsideBookingHours);
        }
    }
    Ok(())
}

/// Walk the gaps of `[range_start, range_end)` not covered by any of the
/// given `(start, end)` intervals. Input must be sorted by start time
/// ascending; intervals entirely outside the range are skipped. Emits
/// non-overlapping windows in time order and never an empty or inverted
/// one.
pub fn free_windows(
    intervals: &[(NaiveDateTime, NaiveDateTime)],
    range_start: NaiveDateTime,
    range_end: NaiveDateTime,
) -> Vec<FreeWindow> {
    let mut windows = Vec::new();
    if range_end <= range_start {
        return windows;
    }

    let mut pointer = range_start;
    for &(start, end) in intervals {
        if !overlaps(start, end, range_start, range_end) {
            continue;
        }
        if start > pointer {
            windows.push(FreeWindow {
                start: pointer,
                end: start.min(range_end),
            });
        }
        pointer = pointer.max(end);
    }

    if pointer < range_end {
        windows.push(FreeWindow {
            start: pointer,
            end: range_end,
        });
    }

    windows
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use proptest::prelude::*;

    fn t(hour: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 14)
            .unwrap()
            .and_hms_opt(hour, min, 0)
            .unwrap()
    }

    #[test]
    fn back_to_back_intervals_do_not_overlap() {
        assert!(!overlaps(t(10, 0), t(11, 0), t(11, 0), t(12, 0)));
        assert!(!overlaps(t(11, 0), t(12, 0), t(10, 0), t(11, 0)));
    }

    #[test]
    fn identical_intervals_overlap() {
        assert!(overlaps(t(10, 0), t(11, 0), t(10, 0), t(11, 0)));
    }

    #[test]
    fn partial_and_contained_intervals_overlap() {
        assert!(overlaps(t(10, 0), t(12, 0), t(11, 0), t(13, 0)));
        assert!(overlaps(t(10, 0), t(12, 0), t(9, 0), t(10, 30)));
        assert!(overlaps(t(10, 0), t(12, 0), t(10, 30), t(11, 0)));
        assert!(overlaps(t(10, 30), t(11, 0), t(10, 0), t(12, 0)));
    }

    #[test]
    fn disjoint_intervals_do_not_overlap() {
        assert!(!overlaps(t(10, 0), t(11, 0), t(12, 0), t(13, 0)));
    }

    #[test]
    fn inverted_range_rejected() {
        let err = validate_time_range(t(11, 0), t(10, 0), t(9, 0)).unwrap_err();
        assert!(matches!(err, EngineError::InvalidRange));
        let err = validate_time_range(t(10, 0), t(10, 0), t(9, 0)).unwrap_err();
        assert!(matches!(err, EngineError::InvalidRange));
    }

    #[test]
    fn past_start_rejected() {
        let err = validate_time_range(t(9, 59), t(12, 0), t(10, 0)).unwrap_err();
        assert!(matches!(err, EngineError::PastReservation));
    }

    #[test]
    fn start_at_now_accepted() {
        assert!(validate_time_range(t(10, 0), t(11, 0), t(10, 0)).is_ok());
    }

    #[test]
    fn unrestricted_room_accepts_any_time() {
        assert!(check_booking_window(None, None, t(0, 30), t(23, 30)).is_ok());
    }

    #[test]
    fn booking_window_bounds_are_enforced() {
        let open = NaiveTime::from_hms_opt(8, 0, 0).unwrap();
        let close = NaiveTime::from_hms_opt(18, 0, 0).unwrap();

        assert!(check_booking_window(Some(open), Some(close), t(8, 0), t(18, 0)).is_ok());
        assert!(matches!(
            check_booking_window(Some(open), Some(close), t(7, 59), t(12, 0)),
            Err(EngineError::OutsideBookingHours)
        ));
        assert!(matches!(
            check_booking_window(Some(open), Some(close), t(10, 0), t(18, 1)),
            Err(EngineError::OutsideBookingHours)
        ));
        // Each bound applies on its own.
        assert!(matches!(
            check_booking_window(None, Some(close), t(1, 0), t(19, 0)),
            Err(EngineError::OutsideBookingHours)
        ));
        assert!(check_booking_window(Some(open), None, t(9, 0), t(23, 59)).is_ok());
    }

    #[test]
    fn free_windows_around_two_reservations() {
        let now = t(12, 0);
        let horizon = now + Duration::hours(24);
        let booked = vec![
            (now + Duration::hours(1), now + Duration::hours(2)),
            (now + Duration::hours(3), now + Duration::hours(4)),
        ];

        let windows = free_windows(&booked, now, horizon);

        assert_eq!(
            windows,
            vec![
                FreeWindow { start: now, end: now + Duration::hours(1) },
                FreeWindow {
                    start: now + Duration::hours(2),
                    end: now + Duration::hours(3),
                },
                FreeWindow { start: now + Duration::hours(4), end: horizon },
            ]
        );
    }

    #[test]
    fn empty_schedule_yields_whole_range() {
        let now = t(12, 0);
        let horizon = now + Duration::hours(24);
        assert_eq!(
            free_windows(&[], now, horizon),
            vec![FreeWindow { start: now, end: horizon }]
        );
    }

    #[test]
    fn fully_booked_range_yields_nothing() {
        let now = t(12, 0);
        let horizon = now + Duration::hours(24);
        let booked = vec![(now - Duration::hours(1), horizon + Duration::hours(1))];
        assert!(free_windows(&booked, now, horizon).is_empty());
    }

    #[test]
    fn reservation_spanning_range_start_trims_first_window() {
        let now = t(12, 0);
        let horizon = now + Duration::hours(24);
        let booked = vec![(now - Duration::hours(1), now + Duration::hours(2))];
        assert_eq!(
            free_windows(&booked, now, horizon),
            vec![FreeWindow { start: now + Duration::hours(2), end: horizon }]
        );
    }

    #[test]
    fn touching_reservations_leave_no_gap_between_them() {
        let now = t(12, 0);
        let horizon = now + Duration::hours(6);
        let booked = vec![
            (now + Duration::hours(1), now + Duration::hours(2)),
            (now + Duration::hours(2), now + Duration::hours(3)),
        ];
        assert_eq!(
            free_windows(&booked, now, horizon),
            vec![
                FreeWindow { start: now, end: now + Duration::hours(1) },
                FreeWindow { start: now + Duration::hours(3), end: horizon },
            ]
        );
    }

    #[test]
    fn inverted_range_yields_nothing() {
        let now = t(12, 0);
        assert!(free_windows(&[], now, now - Duration::hours(1)).is_empty());
        assert!(free_windows(&[], now, now).is_empty());
    }

    // Mirrors the admission path of the lifecycle manager: an interval is
    // accepted only if it overlaps no previously accepted one, and an
    // accepted interval may later be moved with its own slot excluded from
    // the scan.
    proptest! {
        #[test]
        fn accepted_schedule_never_overlaps(
            ops in prop::collection::vec((0u8..2, 0i64..96, 1i64..12, 0usize..16), 1..48)
        ) {
            let base = t(0, 0);
            let mut schedule: Vec<(NaiveDateTime, NaiveDateTime)> = Vec::new();

            for (op, offset, len, pick) in ops {
                let start = base + Duration::minutes(offset * 30);
                let end = start + Duration::minutes(len * 30);

                if op == 0 || schedule.is_empty() {
                    if !schedule
                        .iter()
                        .any(|&(s, e)| overlaps(start, end, s, e))
                    {
                        schedule.push((start, end));
                    }
                } else {
                    let target = pick % schedule.len();
                    let clear = schedule
                        .iter()
                        .enumerate()
                        .all(|(i, &(s, e))| i == target || !overlaps(start, end, s, e));
                    if clear {
                        schedule[target] = (start, end);
                    }
                }

                for (i, &(s1, e1)) in schedule.iter().enumerate() {
                    for &(s2, e2) in &schedule[i + 1..] {
                        prop_assert!(!overlaps(s1, e1, s2, e2));
                    }
                }
            }
        }

        #[test]
        fn free_windows_are_ordered_and_disjoint_from_bookings(
            raw in prop::collection::vec((0i64..96, 1i64..12), 0..24),
            span in 1i64..48,
        ) {
            let base = t(0, 0);
            let range_start = base + Duration::hours(4);
            let range_end = range_start + Duration::hours(span);

            let mut schedule: Vec<(NaiveDateTime, NaiveDateTime)> = Vec::new();
            for (offset, len) in raw {
                let start = base + Duration::minutes(offset * 30);
                let end = start + Duration::minutes(len * 30);
                if !schedule.iter().any(|&(s, e)| overlaps(start, end, s, e)) {
                    schedule.push((start, end));
                }
            }
            schedule.sort_by_key(|&(s, _)| s);

            let windows = free_windows(&schedule, range_start, range_end);

            let mut previous_end = range_start;
            for w in &windows {
                prop_assert!(w.start < w.end);
                prop_assert!(w.start >= previous_end);
                prop_assert!(w.start >= range_start && w.end <= range_end);
                for &(s, e) in &schedule {
                    prop_assert!(!overlaps(w.start, w.end, s, e));
                }
                previous_end = w.end;
            }
        }
    }
}
