use std::fmt;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Local wall-clock timestamp. Dates, times of day and `now` all share the
/// space's local time.
pub type Timestamp = NaiveDateTime;

const SLOT_SECS: i64 = 3600;

macro_rules! ulid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Ulid);

        impl $name {
            pub fn new() -> Self {
                Self(Ulid::new())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

ulid_id!(
    /// A rentable space. Owned by the listing service, referenced here by id only.
    SpaceId
);
ulid_id!(
    /// A guest or host account, owned by the identity service.
    UserId
);
ulid_id!(WindowId);
ulid_id!(ReservationId);

// ── Interval arithmetic ──────────────────────────────────────────

/// Half-open time-of-day interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl Span {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    /// Like `new`, but rejects empty and inverted ranges instead of asserting.
    pub fn try_new(start: NaiveTime, end: NaiveTime) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Whole hours covered by the span; `None` for fractional-hour spans.
    pub fn duration_hours(&self) -> Option<i64> {
        let secs = self.duration().num_seconds();
        (secs > 0 && secs % SLOT_SECS == 0).then_some(secs / SLOT_SECS)
    }

    /// Touching spans (`self.end == other.start`) do not overlap.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Returns true if `self` fully contains `other`.
    pub fn contains(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Every one-hour slot start inside the span, in order.
    pub fn hourly_slots(&self) -> HourlySlots {
        HourlySlots {
            next: Some(self.start),
            end: self.end,
        }
    }

    /// The one-hour span starting at `start`, if it does not cross midnight.
    pub fn slot_at(start: NaiveTime) -> Option<Span> {
        add_slot(start).map(|end| Span { start, end })
    }
}

fn add_slot(t: NaiveTime) -> Option<NaiveTime> {
    let (next, wrapped) = t.overflowing_add_signed(Duration::seconds(SLOT_SECS));
    (wrapped == 0).then_some(next)
}

/// Lazy slot-start sequence produced by [`Span::hourly_slots`].
#[derive(Debug, Clone)]
pub struct HourlySlots {
    next: Option<NaiveTime>,
    end: NaiveTime,
}

impl Iterator for HourlySlots {
    type Item = NaiveTime;

    fn next(&mut self) -> Option<NaiveTime> {
        let start = self.next.take()?;
        let slot_end = add_slot(start)?;
        if slot_end > self.end {
            return None;
        }
        self.next = Some(slot_end);
        Some(start)
    }
}

impl std::iter::FusedIterator for HourlySlots {}

// ── Availability windows ─────────────────────────────────────────

/// A host-declared span on one date during which a space may be booked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    pub id: WindowId,
    pub space_id: SpaceId,
    pub date: NaiveDate,
    pub span: Span,
    pub deleted_at: Option<Timestamp>,
}

impl AvailabilityWindow {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Input to a bulk replacement: one window per date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSpec {
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl WindowSpec {
    pub fn new(date: NaiveDate, start: NaiveTime, end: NaiveTime) -> Self {
        Self { date, start, end }
    }
}

// ── Reservations ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReservationStatus {
    Pending,
    Accepted,
    Rejected,
    Completed,
}

impl ReservationStatus {
    /// Everything but REJECTED takes part in conflict detection.
    pub fn is_active(self) -> bool {
        !matches!(self, ReservationStatus::Rejected)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReservationStatus::Pending => "PENDING",
            ReservationStatus::Accepted => "ACCEPTED",
            ReservationStatus::Rejected => "REJECTED",
            ReservationStatus::Completed => "COMPLETED",
        }
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub guest_id: UserId,
    pub host_id: UserId,
    pub space_id: SpaceId,
    pub date: NaiveDate,
    pub span: Span,
    /// Integral currency units.
    pub price: i64,
    pub guest_count: u32,
    pub status: ReservationStatus,
    pub usage_purpose: Option<String>,
    pub request_message: Option<String>,
    /// Soft-cancel marker. The last status is kept.
    pub deleted_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Reservation {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Part of the active set: not cancelled and not rejected.
    pub fn is_active(&self) -> bool {
        !self.is_deleted() && self.status.is_active()
    }

    pub fn starts_at(&self) -> Timestamp {
        self.date.and_time(self.span.start)
    }

    pub fn ends_at(&self) -> Timestamp {
        self.date.and_time(self.span.end)
    }
}

/// A guest's booking request. Host, price per hour and capacity are filled
/// in from the space directory by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingRequest {
    pub space_id: SpaceId,
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub price: i64,
    pub guest_count: u32,
    pub usage_purpose: Option<String>,
    pub request_message: Option<String>,
}

// ── WAL events ───────────────────────────────────────────────────

/// Committed state changes. One WAL frame each, and the payload subscribers receive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    WindowsReplaced {
        space_id: SpaceId,
        windows: Vec<AvailabilityWindow>,
    },
    WindowRemoved {
        id: WindowId,
        space_id: SpaceId,
        at: Timestamp,
    },
    ReservationRequested {
        reservation: Reservation,
    },
    ReservationStatusChanged {
        id: ReservationId,
        space_id: SpaceId,
        status: ReservationStatus,
        at: Timestamp,
    },
    ReservationCancelled {
        id: ReservationId,
        space_id: SpaceId,
        at: Timestamp,
    },
}

impl Event {
    pub fn space_id(&self) -> SpaceId {
        match self {
            Event::WindowsReplaced { space_id, .. }
            | Event::WindowRemoved { space_id, .. }
            | Event::ReservationStatusChanged { space_id, .. }
            | Event::ReservationCancelled { space_id, .. } => *space_id,
            Event::ReservationRequested { reservation } => reservation.space_id,
        }
    }

    /// JSON payload handed to subscribers that forward notifications.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
