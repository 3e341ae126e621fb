use chrono::NaiveDate;
use thiserror::Error;

use crate::model::{ReservationId, ReservationStatus, SpaceId, UserId, WindowId};

/// Coarse classification callers branch on ("taken" vs "forbidden" vs "numbers don't add up").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Unauthorized,
    Mismatch,
    InvalidState,
    Conflict,
    Limit,
    Storage,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("space not found: {0}")]
    SpaceNotFound(SpaceId),
    #[error("user not found: {0}")]
    UserNotFound(UserId),
    #[error("reservation not found: {0}")]
    ReservationNotFound(ReservationId),
    #[error("availability window not found: {0}")]
    WindowNotFound(WindowId),
    /// Past time, outside every window, or already taken.
    #[error("no available time for the requested date and time")]
    AvailableTimeNotFound,
    #[error("user {0} is not allowed to act on this resource")]
    Unauthorized(UserId),
    #[error("guest count {requested} does not fit capacity {max}")]
    CapacityExceeded { requested: u32, max: u32 },
    #[error("guest count must be at least 1")]
    InvalidGuestCount,
    #[error("booking duration must be a whole number of hours")]
    FractionalDuration,
    #[error("price {actual} does not match expected {expected}")]
    PriceMismatch { expected: i64, actual: i64 },
    #[error("reservation {reservation} does not belong to space {space}")]
    SpaceReservationMismatch {
        reservation: ReservationId,
        space: SpaceId,
    },
    #[error("start must be before end")]
    InvalidTimeRange,
    #[error("more than one availability window for {0}")]
    DuplicateWindow(NaiveDate),
    #[error("cannot {action} a {status} reservation")]
    InvalidState {
        status: ReservationStatus,
        action: &'static str,
    },
    #[error("reservation {0} has already elapsed")]
    ReservationElapsed(ReservationId),
    #[error("conflict with reservation: {0}")]
    Conflict(ReservationId),
    #[error("limit exceeded: {0}")]
    LimitExceeded(&'static str),
    #[error("WAL error: {0}")]
    WalError(String),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::SpaceNotFound(_)
            | EngineError::UserNotFound(_)
            | EngineError::ReservationNotFound(_)
            | EngineError::WindowNotFound(_)
            | EngineError::AvailableTimeNotFound => ErrorKind::NotFound,
            EngineError::Unauthorized(_) => ErrorKind::Unauthorized,
            EngineError::CapacityExceeded { .. }
            | EngineError::InvalidGuestCount
            | EngineError::FractionalDuration
            | EngineError::PriceMismatch { .. }
            | EngineError::SpaceReservationMismatch { .. }
            | EngineError::InvalidTimeRange
            | EngineError::DuplicateWindow(_) => ErrorKind::Mismatch,
            EngineError::InvalidState { .. } | EngineError::ReservationElapsed(_) => {
                ErrorKind::InvalidState
            }
            EngineError::Conflict(_) => ErrorKind::Conflict,
            EngineError::LimitExceeded(_) => ErrorKind::Limit,
            EngineError::WalError(_) => ErrorKind::Storage,
        }
    }

    /// Short label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            EngineError::SpaceNotFound(_) => "space_not_found",
            EngineError::UserNotFound(_) => "user_not_found",
            EngineError::ReservationNotFound(_) => "reservation_not_found",
            EngineError::WindowNotFound(_) => "window_not_found",
            EngineError::AvailableTimeNotFound => "available_time_not_found",
            EngineError::Unauthorized(_) => "unauthorized",
            EngineError::CapacityExceeded { .. } => "capacity_exceeded",
            EngineError::InvalidGuestCount => "invalid_guest_count",
            EngineError::FractionalDuration => "fractional_duration",
            EngineError::PriceMismatch { .. } => "price_mismatch",
            EngineError::SpaceReservationMismatch { .. } => "space_reservation_mismatch",
            EngineError::InvalidTimeRange => "invalid_time_range",
            EngineError::DuplicateWindow(_) => "duplicate_window",
            EngineError::InvalidState { .. } => "invalid_state",
            EngineError::ReservationElapsed(_) => "reservation_elapsed",
            EngineError::Conflict(_) => "conflict",
            EngineError::LimitExceeded(_) => "limit_exceeded",
            EngineError::WalError(_) => "wal_error",
        }
    }
}
