use std::collections::HashSet;
use std::time::Instant;

use tokio::sync::oneshot;
use tracing::{debug, info};

use crate::directory::SpaceInfo;
use crate::limits::*;
use crate::model::*;
use crate::observability;

use super::lifecycle::{self, HostDecision};
use super::validator::{validate_and_prepare, BookingCheck};
use super::{Engine, EngineError, WalCommand};

impl Engine {
    async fn owned_space(
        &self,
        host: UserId,
        space_id: SpaceId,
    ) -> Result<SpaceInfo, EngineError> {
        let space = self
            .spaces
            .find_space(space_id)
            .await
            .ok_or(EngineError::SpaceNotFound(space_id))?;
        if space.host_id != host {
            return Err(EngineError::Unauthorized(host));
        }
        Ok(space)
    }

    // ── Availability ─────────────────────────────────────────

    /// Replace every window of a space with `specs`. Existing reservations
    /// are left untouched even when no window covers them any more.
    pub async fn replace_availability(
        &self,
        host: UserId,
        space_id: SpaceId,
        specs: Vec<WindowSpec>,
    ) -> Result<Vec<WindowId>, EngineError> {
        let started = Instant::now();
        let result = self.replace_availability_inner(host, space_id, specs).await;
        observability::record("replace_availability", started, &result);
        result
    }

    async fn replace_availability_inner(
        &self,
        host: UserId,
        space_id: SpaceId,
        specs: Vec<WindowSpec>,
    ) -> Result<Vec<WindowId>, EngineError> {
        if specs.len() > MAX_WINDOWS_PER_REPLACE {
            return Err(EngineError::LimitExceeded("too many windows"));
        }
        self.owned_space(host, space_id).await?;

        let mut dates = HashSet::with_capacity(specs.len());
        let mut windows = Vec::with_capacity(specs.len());
        for spec in specs {
            let span =
                Span::try_new(spec.start, spec.end).ok_or(EngineError::InvalidTimeRange)?;
            if !dates.insert(spec.date) {
                return Err(EngineError::DuplicateWindow(spec.date));
            }
            windows.push(AvailabilityWindow {
                id: WindowId::new(),
                space_id,
                date: spec.date,
                span,
                deleted_at: None,
            });
        }
        let ids: Vec<WindowId> = windows.iter().map(|w| w.id).collect();

        let ss = self.store.get_or_create_space(space_id);
        let mut guard = ss.write().await;
        let event = Event::WindowsReplaced { space_id, windows };
        self.persist_and_apply(&mut guard, &event).await?;
        info!("space {space_id}: availability replaced with {} windows", ids.len());
        Ok(ids)
    }

    /// Soft-delete one window.
    pub async fn remove_window(
        &self,
        host: UserId,
        window_id: WindowId,
    ) -> Result<(), EngineError> {
        let started = Instant::now();
        let result = self.remove_window_inner(host, window_id).await;
        observability::record("remove_window", started, &result);
        result
    }

    async fn remove_window_inner(
        &self,
        host: UserId,
        window_id: WindowId,
    ) -> Result<(), EngineError> {
        let space_id = self
            .store
            .space_for_window(&window_id)
            .ok_or(EngineError::WindowNotFound(window_id))?;
        self.owned_space(host, space_id).await?;

        let ss = self
            .store
            .get_space(&space_id)
            .ok_or(EngineError::WindowNotFound(window_id))?;
        let mut guard = ss.write().await;
        if guard.window(window_id).is_none() {
            return Err(EngineError::WindowNotFound(window_id));
        }
        let event = Event::WindowRemoved {
            id: window_id,
            space_id,
            at: self.clock.now(),
        };
        self.persist_and_apply(&mut guard, &event).await?;
        info!("space {space_id}: window {window_id} removed");
        Ok(())
    }

    // ── Booking ──────────────────────────────────────────────

    /// Validate and record a PENDING reservation. The conflict check and the
    /// insert happen under the same space write lock.
    pub async fn create_booking(
        &self,
        guest: UserId,
        request: BookingRequest,
    ) -> Result<ReservationId, EngineError> {
        let started = Instant::now();
        let result = self.create_booking_inner(guest, request).await;
        observability::record("create_booking", started, &result);
        result
    }

    async fn create_booking_inner(
        &self,
        guest: UserId,
        request: BookingRequest,
    ) -> Result<ReservationId, EngineError> {
        self.users
            .find_user(guest)
            .await
            .ok_or(EngineError::UserNotFound(guest))?;
        let space = self
            .spaces
            .find_space(request.space_id)
            .await
            .ok_or(EngineError::SpaceNotFound(request.space_id))?;
        let check = BookingCheck::new(guest, request, &space);

        let ss = self.store.get_or_create_space(space.id);
        let mut guard = ss.write().await;
        let now = self.clock.now();
        if guard.open_reservation_count(now.date()) >= MAX_OPEN_RESERVATIONS_PER_SPACE {
            return Err(EngineError::LimitExceeded("too many open reservations on space"));
        }
        let reservation = validate_and_prepare(&guard, check, now)?;
        let id = reservation.id;
        let (date, span) = (reservation.date, reservation.span);

        let event = Event::ReservationRequested { reservation };
        self.persist_and_apply(&mut guard, &event).await?;
        metrics::counter!(
            observability::TRANSITIONS_TOTAL,
            "status" => ReservationStatus::Pending.as_str()
        )
        .increment(1);
        info!(
            "space {}: reservation {id} requested by {guest} for {date} {}-{}",
            space.id, span.start, span.end
        );
        Ok(id)
    }

    // ── Lifecycle ────────────────────────────────────────────

    pub async fn accept_reservation(
        &self,
        host: UserId,
        reservation_id: ReservationId,
        space_id: SpaceId,
    ) -> Result<(), EngineError> {
        let started = Instant::now();
        let result = self
            .decide_reservation(host, reservation_id, space_id, HostDecision::Accept)
            .await;
        observability::record("accept_reservation", started, &result);
        result
    }

    pub async fn reject_reservation(
        &self,
        host: UserId,
        reservation_id: ReservationId,
        space_id: SpaceId,
    ) -> Result<(), EngineError> {
        let started = Instant::now();
        let result = self
            .decide_reservation(host, reservation_id, space_id, HostDecision::Reject)
            .await;
        observability::record("reject_reservation", started, &result);
        result
    }

    async fn decide_reservation(
        &self,
        host: UserId,
        reservation_id: ReservationId,
        space_id: SpaceId,
        decision: HostDecision,
    ) -> Result<(), EngineError> {
        let mut guard = self.resolve_reservation_write(&reservation_id).await?;
        let reservation = guard
            .reservation_row(reservation_id)
            .cloned()
            .ok_or(EngineError::ReservationNotFound(reservation_id))?;
        lifecycle::ensure_live(&reservation)?;

        let owning_space = guard.id;
        let actor = self
            .users
            .find_user(host)
            .await
            .ok_or(EngineError::UserNotFound(host))?;
        let owner = self
            .spaces
            .find_space(owning_space)
            .await
            .ok_or(EngineError::SpaceNotFound(owning_space))?
            .host_id;
        let status = lifecycle::decide(&reservation, decision, &actor, owner, space_id)?;

        let event = Event::ReservationStatusChanged {
            id: reservation_id,
            space_id: owning_space,
            status,
            at: self.clock.now(),
        };
        self.persist_and_apply(&mut guard, &event).await?;
        metrics::counter!(observability::TRANSITIONS_TOTAL, "status" => status.as_str())
            .increment(1);
        info!("space {owning_space}: reservation {reservation_id} {status} by {host}");
        Ok(())
    }

    /// Guest cancellation: soft delete, status kept.
    pub async fn cancel_reservation(
        &self,
        guest: UserId,
        reservation_id: ReservationId,
    ) -> Result<(), EngineError> {
        let started = Instant::now();
        let result = self.cancel_reservation_inner(guest, reservation_id).await;
        observability::record("cancel_reservation", started, &result);
        result
    }

    async fn cancel_reservation_inner(
        &self,
        guest: UserId,
        reservation_id: ReservationId,
    ) -> Result<(), EngineError> {
        let mut guard = self.resolve_reservation_write(&reservation_id).await?;
        let now = self.clock.now();
        let reservation = guard
            .reservation(reservation_id)
            .ok_or(EngineError::ReservationNotFound(reservation_id))?;
        lifecycle::cancel(reservation, guest, now)?;

        let event = Event::ReservationCancelled {
            id: reservation_id,
            space_id: guard.id,
            at: now,
        };
        self.persist_and_apply(&mut guard, &event).await?;
        metrics::counter!(observability::TRANSITIONS_TOTAL, "status" => "CANCELLED").increment(1);
        info!("space {}: reservation {reservation_id} cancelled by {guest}", guard.id);
        Ok(())
    }

    /// Time-driven ACCEPTED → COMPLETED. Completing a completed reservation
    /// is a no-op. Returns the resulting status.
    pub async fn complete_reservation(
        &self,
        reservation_id: ReservationId,
    ) -> Result<ReservationStatus, EngineError> {
        let mut guard = self.resolve_reservation_write(&reservation_id).await?;
        let now = self.clock.now();
        let reservation = guard
            .reservation(reservation_id)
            .ok_or(EngineError::ReservationNotFound(reservation_id))?;
        let Some(status) = lifecycle::complete(reservation, now)? else {
            return Ok(ReservationStatus::Completed);
        };

        let event = Event::ReservationStatusChanged {
            id: reservation_id,
            space_id: guard.id,
            status,
            at: now,
        };
        self.persist_and_apply(&mut guard, &event).await?;
        metrics::counter!(observability::TRANSITIONS_TOTAL, "status" => status.as_str())
            .increment(1);
        Ok(status)
    }

    /// Reservations the completion rule currently applies to.
    pub async fn collect_elapsed(&self, now: Timestamp) -> Vec<ReservationId> {
        let mut due = Vec::new();
        for space_id in self.store.space_ids() {
            let Some(ss) = self.store.get_space(&space_id) else {
                continue;
            };
            let guard = ss.read().await;
            due.extend(
                guard
                    .reservations
                    .iter()
                    .filter(|r| lifecycle::is_due_for_completion(r, now))
                    .map(|r| r.id),
            );
        }
        due
    }

    /// Complete every ACCEPTED reservation whose end has passed.
    pub async fn complete_elapsed(&self) -> Vec<ReservationId> {
        let due = self.collect_elapsed(self.clock.now()).await;
        let mut completed = Vec::with_capacity(due.len());
        for id in due {
            match self.complete_reservation(id).await {
                Ok(_) => completed.push(id),
                // cancelled or completed concurrently
                Err(e) => debug!("completion skip {id}: {e}"),
            }
        }
        if !completed.is_empty() {
            metrics::counter!(observability::COMPLETIONS_TOTAL).increment(completed.len() as u64);
            info!("completed {} elapsed reservations", completed.len());
        }
        completed
    }

    // ── WAL maintenance ──────────────────────────────────────

    /// Rewrite the WAL with only the events needed to recreate the current state.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let mut events = Vec::new();
        // Read guards stay held until the rewrite is in place so no write to a
        // known space can land in the log being replaced.
        let mut guards = Vec::new();
        for space_id in self.store.space_ids() {
            let Some(ss) = self.store.get_space(&space_id) else {
                continue;
            };
            let guard = ss.read_owned().await;
            if !guard.windows.is_empty() {
                events.push(Event::WindowsReplaced {
                    space_id,
                    windows: guard.windows.clone(),
                });
            }
            for reservation in &guard.reservations {
                events.push(Event::ReservationRequested {
                    reservation: reservation.clone(),
                });
            }
            guards.push(guard);
        }
        let count = events.len();

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))?;
        drop(guards);
        metrics::counter!(observability::WAL_COMPACTIONS_TOTAL).increment(1);
        info!("WAL compacted to {count} events");
        Ok(())
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
