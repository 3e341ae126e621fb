use chrono::{NaiveDate, NaiveTime};
use tracing::debug;

use crate::directory::SpaceInfo;
use crate::limits::*;
use crate::model::*;

use super::store::SpaceState;
use super::EngineError;

/// A booking request joined with the space facts it is validated against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingCheck {
    pub space_id: SpaceId,
    pub host_id: UserId,
    pub guest_id: UserId,
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub price: i64,
    pub guest_count: u32,
    pub price_per_hour: i64,
    pub max_capacity: u32,
    pub usage_purpose: Option<String>,
    pub request_message: Option<String>,
}

impl BookingCheck {
    pub fn new(guest_id: UserId, request: BookingRequest, space: &SpaceInfo) -> Self {
        Self {
            space_id: request.space_id,
            host_id: space.host_id,
            guest_id,
            date: request.date,
            start: request.start,
            end: request.end,
            price: request.price,
            guest_count: request.guest_count,
            price_per_hour: space.price_per_hour,
            max_capacity: space.max_capacity,
            usage_purpose: request.usage_purpose,
            request_message: request.request_message,
        }
    }
}

fn check_shape(check: &BookingCheck) -> Result<Span, EngineError> {
    let span = Span::try_new(check.start, check.end).ok_or(EngineError::InvalidTimeRange)?;
    if check.guest_count == 0 {
        return Err(EngineError::InvalidGuestCount);
    }
    if check
        .usage_purpose
        .as_ref()
        .is_some_and(|p| p.len() > MAX_USAGE_PURPOSE_LEN)
    {
        return Err(EngineError::LimitExceeded("usage purpose too long"));
    }
    if check
        .request_message
        .as_ref()
        .is_some_and(|m| m.len() > MAX_REQUEST_MESSAGE_LEN)
    {
        return Err(EngineError::LimitExceeded("request message too long"));
    }
    Ok(span)
}

/// Run every booking check against one space's state, first failure wins:
/// not in the past, inside the date's window, free of active reservations,
/// within capacity, price equal to `price_per_hour × hours`.
///
/// Past, outside-window and conflicting requests all report
/// `AvailableTimeNotFound`. Nothing is written: the caller inserts the
/// returned PENDING reservation.
pub fn validate_and_prepare(
    ss: &SpaceState,
    check: BookingCheck,
    now: Timestamp,
) -> Result<Reservation, EngineError> {
    let span = check_shape(&check)?;

    let today = now.date();
    if check.date < today || (check.date == today && span.start < now.time()) {
        debug!(
            space = %check.space_id,
            date = %check.date,
            "booking rejected: requested time has passed"
        );
        return Err(EngineError::AvailableTimeNotFound);
    }

    match ss.find_active_window(check.date) {
        Some(window) if window.span.contains(&span) => {}
        _ => {
            debug!(
                space = %check.space_id,
                date = %check.date,
                "booking rejected: outside availability"
            );
            return Err(EngineError::AvailableTimeNotFound);
        }
    }

    if let Some(existing) = ss.conflicting(check.date, &span) {
        debug!(
            space = %check.space_id,
            conflicting = %existing.id,
            "booking rejected: time already taken"
        );
        return Err(EngineError::AvailableTimeNotFound);
    }

    if check.guest_count > check.max_capacity {
        return Err(EngineError::CapacityExceeded {
            requested: check.guest_count,
            max: check.max_capacity,
        });
    }

    let hours = span.duration_hours().ok_or(EngineError::FractionalDuration)?;
    let expected = check
        .price_per_hour
        .checked_mul(hours)
        .ok_or(EngineError::LimitExceeded("price overflow"))?;
    if check.price != expected {
        return Err(EngineError::PriceMismatch {
            expected,
            actual: check.price,
        });
    }

    Ok(Reservation {
        id: ReservationId::new(),
        guest_id: check.guest_id,
        host_id: check.host_id,
        space_id: check.space_id,
        date: check.date,
        span,
        price: check.price,
        guest_count: check.guest_count,
        status: ReservationStatus::Pending,
        usage_purpose: check.usage_purpose,
        request_message: check.request_message,
        deleted_at: None,
        created_at: now,
        updated_at: now,
    })
}
