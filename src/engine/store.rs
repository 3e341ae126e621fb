use std::sync::Arc;

use chrono::NaiveDate;
use dashmap::DashMap;
use tokio::sync::RwLock;

use crate::model::*;

use super::EngineError;

pub type SharedSpaceState = Arc<RwLock<SpaceState>>;

/// Everything the engine knows about one space: its availability windows and
/// every reservation ever made against it.
#[derive(Debug, Clone)]
pub struct SpaceState {
    pub id: SpaceId,
    /// Sorted by `(date, id)`.
    pub windows: Vec<AvailabilityWindow>,
    /// Sorted by `(date, span.start)`. Cancelled and rejected rows are kept.
    pub reservations: Vec<Reservation>,
}

impl SpaceState {
    pub fn new(id: SpaceId) -> Self {
        Self {
            id,
            windows: Vec::new(),
            reservations: Vec::new(),
        }
    }

    // ── Availability windows ─────────────────────────────────

    /// The non-deleted window for `date`. If several exist, the first by id wins.
    pub fn find_active_window(&self, date: NaiveDate) -> Option<&AvailabilityWindow> {
        let from = self.windows.partition_point(|w| w.date < date);
        self.windows[from..]
            .iter()
            .take_while(|w| w.date == date)
            .find(|w| !w.is_deleted())
    }

    /// Hard-delete every window and install `windows`. Returns the removed set.
    pub fn replace_windows(
        &mut self,
        mut windows: Vec<AvailabilityWindow>,
    ) -> Vec<AvailabilityWindow> {
        windows.sort_by_key(|w| (w.date, w.id));
        std::mem::replace(&mut self.windows, windows)
    }

    pub fn active_windows(&self) -> impl Iterator<Item = &AvailabilityWindow> {
        self.windows.iter().filter(|w| !w.is_deleted())
    }

    pub fn window(&self, id: WindowId) -> Option<&AvailabilityWindow> {
        self.windows.iter().find(|w| w.id == id && !w.is_deleted())
    }

    /// Soft delete. Returns false if the window is unknown or already deleted.
    pub fn remove_window(&mut self, id: WindowId, at: Timestamp) -> bool {
        match self.windows.iter_mut().find(|w| w.id == id) {
            Some(w) if !w.is_deleted() => {
                w.deleted_at = Some(at);
                true
            }
            _ => false,
        }
    }

    // ── Reservations ─────────────────────────────────────────

    fn day(&self, date: NaiveDate) -> &[Reservation] {
        let from = self.reservations.partition_point(|r| r.date < date);
        let to = self.reservations.partition_point(|r| r.date <= date);
        &self.reservations[from..to]
    }

    /// Non-deleted, non-rejected reservations on `date`, by start time.
    pub fn active_reservations_for(&self, date: NaiveDate) -> impl Iterator<Item = &Reservation> {
        self.day(date).iter().filter(|r| r.is_active())
    }

    /// Non-deleted reservations on `date`, rejected ones included.
    pub fn all_reservations_for(&self, date: NaiveDate) -> impl Iterator<Item = &Reservation> {
        self.day(date).iter().filter(|r| !r.is_deleted())
    }

    /// First active reservation on `date` overlapping `span`.
    pub fn conflicting(&self, date: NaiveDate, span: &Span) -> Option<&Reservation> {
        self.active_reservations_for(date)
            .find(|r| r.span.overlaps(span))
    }

    /// Insert keeping `(date, start)` order. Refuses a row that would break
    /// the no-overlap invariant of the active set.
    pub fn insert_reservation(
        &mut self,
        reservation: Reservation,
    ) -> Result<ReservationId, EngineError> {
        if reservation.is_active()
            && let Some(existing) = self.conflicting(reservation.date, &reservation.span)
        {
            return Err(EngineError::Conflict(existing.id));
        }
        let id = reservation.id;
        let key = (reservation.date, reservation.span.start);
        let pos = self
            .reservations
            .partition_point(|r| (r.date, r.span.start) <= key);
        self.reservations.insert(pos, reservation);
        Ok(id)
    }

    /// Lookup excluding soft-deleted rows.
    pub fn reservation(&self, id: ReservationId) -> Option<&Reservation> {
        self.reservation_row(id).filter(|r| !r.is_deleted())
    }

    /// Lookup including soft-deleted rows.
    pub fn reservation_row(&self, id: ReservationId) -> Option<&Reservation> {
        self.reservations.iter().find(|r| r.id == id)
    }

    /// Active reservations dated `from` or later; what the per-space cap counts.
    pub fn open_reservation_count(&self, from: NaiveDate) -> usize {
        let start = self.reservations.partition_point(|r| r.date < from);
        self.reservations[start..].iter().filter(|r| r.is_active()).count()
    }

    fn reservation_mut(&mut self, id: ReservationId) -> Option<&mut Reservation> {
        self.reservations.iter_mut().find(|r| r.id == id)
    }

    pub fn update_status(
        &mut self,
        id: ReservationId,
        status: ReservationStatus,
        at: Timestamp,
    ) -> bool {
        match self.reservation_mut(id) {
            Some(r) => {
                r.status = status;
                r.updated_at = at;
                true
            }
            None => false,
        }
    }

    /// Sets `deleted_at`; the status is left as it was.
    pub fn soft_cancel(&mut self, id: ReservationId, at: Timestamp) -> bool {
        match self.reservation_mut(id) {
            Some(r) if !r.is_deleted() => {
                r.deleted_at = Some(at);
                r.updated_at = at;
                true
            }
            _ => false,
        }
    }

    /// Dates on or after `from` holding at least one active reservation.
    pub fn reserved_dates(&self, from: NaiveDate) -> Vec<NaiveDate> {
        let start = self.reservations.partition_point(|r| r.date < from);
        let mut dates: Vec<NaiveDate> = self.reservations[start..]
            .iter()
            .filter(|r| r.is_active())
            .map(|r| r.date)
            .collect();
        dates.dedup();
        dates
    }
}

/// Space states plus the reverse indexes needed to reach them from a
/// reservation, a window, a guest or a host.
pub struct Store {
    spaces: DashMap<SpaceId, SharedSpaceState>,
    reservation_to_space: DashMap<ReservationId, SpaceId>,
    window_to_space: DashMap<WindowId, SpaceId>,
    by_guest: DashMap<UserId, Vec<ReservationId>>,
    by_host: DashMap<UserId, Vec<ReservationId>>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        Self {
            spaces: DashMap::new(),
            reservation_to_space: DashMap::new(),
            window_to_space: DashMap::new(),
            by_guest: DashMap::new(),
            by_host: DashMap::new(),
        }
    }

    // ── Spaces ───────────────────────────────────────────────

    pub fn space_count(&self) -> usize {
        self.spaces.len()
    }

    pub fn get_space(&self, id: &SpaceId) -> Option<SharedSpaceState> {
        self.spaces.get(id).map(|e| e.value().clone())
    }

    pub fn get_or_create_space(&self, id: SpaceId) -> SharedSpaceState {
        self.spaces
            .entry(id)
            .or_insert_with(|| Arc::new(RwLock::new(SpaceState::new(id))))
            .value()
            .clone()
    }

    pub fn space_ids(&self) -> Vec<SpaceId> {
        self.spaces.iter().map(|e| *e.key()).collect()
    }

    // ── Reverse indexes ──────────────────────────────────────

    pub fn space_for_reservation(&self, id: &ReservationId) -> Option<SpaceId> {
        self.reservation_to_space.get(id).map(|e| *e.value())
    }

    pub fn space_for_window(&self, id: &WindowId) -> Option<SpaceId> {
        self.window_to_space.get(id).map(|e| *e.value())
    }

    pub fn guest_reservations(&self, guest: &UserId) -> Vec<ReservationId> {
        self.by_guest
            .get(guest)
            .map(|e| e.value().clone())
            .unwrap_or_default()
    }

    pub fn host_reservations(&self, host: &UserId) -> Vec<ReservationId> {
        self.by_host
            .get(host)
            .map(|e| e.value().clone())
            .unwrap_or_default()
    }

    // ── Event application ────────────────────────────────────

    /// Apply a committed event to a space. The caller holds the lock.
    pub fn apply_event(&self, ss: &mut SpaceState, event: &Event) -> Result<(), EngineError> {
        match event {
            Event::WindowsReplaced { space_id, windows } => {
                for w in windows {
                    self.window_to_space.insert(w.id, *space_id);
                }
                for old in ss.replace_windows(windows.clone()) {
                    if !windows.iter().any(|w| w.id == old.id) {
                        self.window_to_space.remove(&old.id);
                    }
                }
            }
            Event::WindowRemoved { id, at, .. } => {
                ss.remove_window(*id, *at);
            }
            Event::ReservationRequested { reservation } => {
                let id = ss.insert_reservation(reservation.clone())?;
                self.reservation_to_space.insert(id, reservation.space_id);
                self.by_guest.entry(reservation.guest_id).or_default().push(id);
                self.by_host.entry(reservation.host_id).or_default().push(id);
            }
            Event::ReservationStatusChanged { id, status, at, .. } => {
                ss.update_status(*id, *status, *at);
            }
            Event::ReservationCancelled { id, at, .. } => {
                ss.soft_cancel(*id, *at);
            }
        }
        Ok(())
    }
}
