//! Reservation state machine. Every rule about which status may follow which,
//! and who may trigger it, lives here.
//!
//! ```text
//! PENDING ──accept──▶ ACCEPTED ──(end passed)──▶ COMPLETED
//!    └────reject────▶ REJECTED
//! ```
//!
//! Cancellation is orthogonal: it sets `deleted_at` and keeps the status.

use crate::directory::{Role, UserInfo};
use crate::model::*;

use super::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostDecision {
    Accept,
    Reject,
}

impl HostDecision {
    pub fn target(self) -> ReservationStatus {
        match self {
            HostDecision::Accept => ReservationStatus::Accepted,
            HostDecision::Reject => ReservationStatus::Rejected,
        }
    }

    pub fn verb(self) -> &'static str {
        match self {
            HostDecision::Accept => "accept",
            HostDecision::Reject => "reject",
        }
    }
}

/// A cancelled reservation is gone as far as every transition is concerned.
pub fn ensure_live(reservation: &Reservation) -> Result<(), EngineError> {
    if reservation.is_deleted() {
        return Err(EngineError::ReservationNotFound(reservation.id));
    }
    Ok(())
}

/// Guards a host's accept/reject and returns the status to move to.
///
/// `space_owner` is the current owner of the reservation's space; `space_id`
/// is the space the caller claims the reservation belongs to.
pub fn decide(
    reservation: &Reservation,
    decision: HostDecision,
    actor: &UserInfo,
    space_owner: UserId,
    space_id: SpaceId,
) -> Result<ReservationStatus, EngineError> {
    ensure_live(reservation)?;
    if actor.role != Role::Host || space_owner != actor.id {
        return Err(EngineError::Unauthorized(actor.id));
    }
    if reservation.space_id != space_id {
        return Err(EngineError::SpaceReservationMismatch {
            reservation: reservation.id,
            space: space_id,
        });
    }
    if reservation.status != ReservationStatus::Pending {
        return Err(EngineError::InvalidState {
            status: reservation.status,
            action: decision.verb(),
        });
    }
    Ok(decision.target())
}

/// True when the time-driven completion rule applies.
pub fn is_due_for_completion(reservation: &Reservation, now: Timestamp) -> bool {
    !reservation.is_deleted()
        && reservation.status == ReservationStatus::Accepted
        && now > reservation.ends_at()
}

/// `Ok(Some(COMPLETED))` when the transition applies, `Ok(None)` when the
/// reservation is already completed.
pub fn complete(
    reservation: &Reservation,
    now: Timestamp,
) -> Result<Option<ReservationStatus>, EngineError> {
    match reservation.status {
        ReservationStatus::Completed => Ok(None),
        ReservationStatus::Accepted if now > reservation.ends_at() => {
            Ok(Some(ReservationStatus::Completed))
        }
        status => Err(EngineError::InvalidState {
            status,
            action: "complete",
        }),
    }
}

/// Only the guest may cancel, and only while the reservation has not fully
/// elapsed. Any status qualifies.
pub fn cancel(reservation: &Reservation, actor: UserId, now: Timestamp) -> Result<(), EngineError> {
    if reservation.guest_id != actor {
        return Err(EngineError::Unauthorized(actor));
    }
    if now >= reservation.ends_at() {
        return Err(EngineError::ReservationElapsed(reservation.id));
    }
    Ok(())
}
