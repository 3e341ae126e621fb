use chrono::{NaiveDate, NaiveTime};
use tokio::sync::broadcast;

use crate::model::*;

use super::slots::compute_available_slots;
use super::{Engine, EngineError};

impl Engine {
    /// Bookable hourly slot starts on `date`. Empty when the space is
    /// unknown or has no window that day.
    pub async fn get_available_slots(&self, space_id: SpaceId, date: NaiveDate) -> Vec<NaiveTime> {
        let Some(ss) = self.store.get_space(&space_id) else {
            return Vec::new();
        };
        let guard = ss.read().await;
        let Some(window) = guard.find_active_window(date) else {
            return Vec::new();
        };
        let active: Vec<&Reservation> = guard.active_reservations_for(date).collect();
        compute_available_slots(window, &active, self.clock.now())
    }

    /// Current non-deleted windows of a space, by date.
    pub async fn get_windows(&self, space_id: SpaceId) -> Vec<AvailabilityWindow> {
        let Some(ss) = self.store.get_space(&space_id) else {
            return Vec::new();
        };
        let guard = ss.read().await;
        guard.active_windows().cloned().collect()
    }

    /// A reservation by id. Cancelled reservations are not found.
    pub async fn get_reservation(&self, id: ReservationId) -> Result<Reservation, EngineError> {
        let space_id = self
            .store
            .space_for_reservation(&id)
            .ok_or(EngineError::ReservationNotFound(id))?;
        let ss = self
            .store
            .get_space(&space_id)
            .ok_or(EngineError::ReservationNotFound(id))?;
        let guard = ss.read().await;
        guard
            .reservation(id)
            .cloned()
            .ok_or(EngineError::ReservationNotFound(id))
    }

    /// Non-cancelled reservations on `date`, rejected included.
    pub async fn reservations_for_space(
        &self,
        space_id: SpaceId,
        date: NaiveDate,
    ) -> Vec<Reservation> {
        let Some(ss) = self.store.get_space(&space_id) else {
            return Vec::new();
        };
        let guard = ss.read().await;
        guard.all_reservations_for(date).cloned().collect()
    }

    /// The active set on `date`: neither cancelled nor rejected.
    pub async fn active_reservations_for_space(
        &self,
        space_id: SpaceId,
        date: NaiveDate,
    ) -> Vec<Reservation> {
        let Some(ss) = self.store.get_space(&space_id) else {
            return Vec::new();
        };
        let guard = ss.read().await;
        guard.active_reservations_for(date).cloned().collect()
    }

    pub async fn reservations_for_guest(
        &self,
        guest: UserId,
        status: Option<ReservationStatus>,
    ) -> Vec<Reservation> {
        let ids = self.store.guest_reservations(&guest);
        self.collect_reservations(ids, status).await
    }

    pub async fn reservations_for_host(
        &self,
        host: UserId,
        status: Option<ReservationStatus>,
    ) -> Vec<Reservation> {
        let ids = self.store.host_reservations(&host);
        self.collect_reservations(ids, status).await
    }

    async fn collect_reservations(
        &self,
        ids: Vec<ReservationId>,
        status: Option<ReservationStatus>,
    ) -> Vec<Reservation> {
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            // cancelled rows drop out here
            let Ok(r) = self.get_reservation(id).await else {
                continue;
            };
            if status.is_none_or(|s| r.status == s) {
                out.push(r);
            }
        }
        out.sort_by_key(|r| (r.date, r.span.start, r.id));
        out
    }

    /// Dates from `from` onwards that hold at least one active reservation.
    pub async fn reserved_dates(&self, space_id: SpaceId, from: NaiveDate) -> Vec<NaiveDate> {
        let Some(ss) = self.store.get_space(&space_id) else {
            return Vec::new();
        };
        let guard = ss.read().await;
        guard.reserved_dates(from)
    }

    /// Committed events for one space, in commit order.
    pub fn subscribe(&self, space_id: SpaceId) -> broadcast::Receiver<Event> {
        self.notify.subscribe(space_id)
    }
}
