use chrono::NaiveTime;

use crate::model::*;

// ── Slot Algorithm ────────────────────────────────────────────────

/// Bookable one-hour start times for `window`, in chronological order.
///
/// Past dates yield nothing. On the current date, slots that already started
/// before `now` are dropped. Any slot overlapping an active reservation is
/// dropped. `active` must only hold reservations for the window's space and
/// date; the date is not re-checked here.
pub fn compute_available_slots(
    window: &AvailabilityWindow,
    active: &[&Reservation],
    now: Timestamp,
) -> Vec<NaiveTime> {
    let today = now.date();
    if window.date < today {
        return Vec::new();
    }
    let earliest = (window.date == today).then(|| now.time());

    window
        .span
        .hourly_slots()
        .filter(|start| earliest.is_none_or(|e| *start >= e))
        .filter(|start| {
            // hourly_slots never yields a slot crossing midnight
            let Some(slot) = Span::slot_at(*start) else {
                return false;
            };
            !active.iter().any(|r| r.span.overlaps(&slot))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, 5, d).unwrap()
    }

    fn window(date: NaiveDate, start: u32, end: u32) -> AvailabilityWindow {
        AvailabilityWindow {
            id: WindowId::new(),
            space_id: SpaceId::new(),
            date,
            span: Span::new(t(start, 0), t(end, 0)),
            deleted_at: None,
        }
    }

    fn accepted(date: NaiveDate, start: NaiveTime, end: NaiveTime) -> Reservation {
        let created = date.pred_opt().unwrap().and_time(t(8, 0));
        Reservation {
            id: ReservationId::new(),
            guest_id: UserId::new(),
            host_id: UserId::new(),
            space_id: SpaceId::new(),
            date,
            span: Span::new(start, end),
            price: 0,
            guest_count: 1,
            status: ReservationStatus::Accepted,
            usage_purpose: None,
            request_message: None,
            deleted_at: None,
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn future_window_without_reservations() {
        let w = window(day(20), 9, 12);
        let now = day(10).and_time(t(15, 0));
        assert_eq!(
            compute_available_slots(&w, &[], now),
            vec![t(9, 0), t(10, 0), t(11, 0)]
        );
    }

    #[test]
    fn reservation_removes_its_slot() {
        let w = window(day(20), 9, 12);
        let r = accepted(day(20), t(10, 0), t(11, 0));
        let now = day(10).and_time(t(15, 0));
        assert_eq!(
            compute_available_slots(&w, &[&r], now),
            vec![t(9, 0), t(11, 0)]
        );
    }

    #[test]
    fn today_drops_started_slots() {
        let w = window(day(10), 9, 18);
        let now = day(10).and_time(t(14, 30));
        assert_eq!(
            compute_available_slots(&w, &[], now),
            vec![t(15, 0), t(16, 0), t(17, 0)]
        );
    }

    #[test]
    fn today_keeps_slot_starting_exactly_now() {
        let w = window(day(10), 9, 12);
        let now = day(10).and_time(t(10, 0));
        assert_eq!(compute_available_slots(&w, &[], now), vec![t(10, 0), t(11, 0)]);
    }

    #[test]
    fn past_date_has_no_slots() {
        let w = window(day(9), 9, 18);
        let now = day(10).and_time(t(0, 5));
        assert!(compute_available_slots(&w, &[], now).is_empty());
    }

    #[test]
    fn partial_overlap_blocks_both_slots() {
        // a 10:30-11:30 booking touches the 10:00 and 11:00 slots
        let w = window(day(20), 9, 13);
        let r = accepted(day(20), t(10, 30), t(11, 30));
        let now = day(10).and_time(t(8, 0));
        assert_eq!(
            compute_available_slots(&w, &[&r], now),
            vec![t(9, 0), t(12, 0)]
        );
    }

    #[test]
    fn adjacent_reservation_does_not_block() {
        let w = window(day(20), 9, 12);
        let r = accepted(day(20), t(8, 0), t(9, 0));
        let now = day(10).and_time(t(8, 0));
        assert_eq!(compute_available_slots(&w, &[&r], now).len(), 3);
    }

    #[test]
    fn fully_booked_window() {
        let w = window(day(20), 9, 12);
        let r = accepted(day(20), t(9, 0), t(12, 0));
        let now = day(10).and_time(t(8, 0));
        assert!(compute_available_slots(&w, &[&r], now).is_empty());
    }

    #[test]
    fn every_slot_is_inside_window_and_free() {
        let w = window(day(20), 8, 20);
        let r1 = accepted(day(20), t(9, 0), t(11, 0));
        let r2 = accepted(day(20), t(15, 0), t(16, 0));
        let now = day(10).and_time(t(8, 0));
        let slots = compute_available_slots(&w, &[&r1, &r2], now);
        assert!(!slots.is_empty());
        for s in slots {
            let slot = Span::slot_at(s).unwrap();
            assert!(w.span.contains(&slot));
            assert!(!slot.overlaps(&r1.span));
            assert!(!slot.overlaps(&r2.span));
        }
    }
}
