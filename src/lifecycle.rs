use chrono::NaiveDate;
use thiserror::Error;

use crate::models::{AuthUser, BookingStatus};

/// Deployment-time choice between the 6-state lifecycle (distinct EXPIRED)
/// and the 5-state one (expiration maps to CLOSED). Resolved once at startup
/// from `Config::distinct_expired_status`, never probed per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecyclePolicy {
    pub distinct_expired: bool,
}

impl LifecyclePolicy {
    /// Status a booking lands on when its period has fully elapsed.
    #[must_use]
    pub fn expire_target(self) -> BookingStatus {
        if self.distinct_expired {
            BookingStatus::Expired
        } else {
            BookingStatus::Closed
        }
    }
}

/// User- or clock-driven transition requests. Creation is not an action:
/// bookings always enter the machine as PENDING.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Cancel,
    RequestReturn,
    ConfirmReturn,
    AdminApprove,
    AdminReject,
    ClockExpire,
}

impl Action {
    /// Approve and reject are administrator capabilities; the other actions
    /// belong to the booking's owner (or an admin acting on their behalf).
    #[must_use]
    pub fn admin_only(self) -> bool {
        matches!(self, Self::AdminApprove | Self::AdminReject)
    }
}

/// Whether `caller` may request `action` on a booking owned by `owner_id`.
///
/// Checked before the state machine runs: an unauthorized caller gets a
/// permission failure regardless of whether the transition itself would
/// have been legal.
#[must_use]
pub fn is_authorized(action: Action, caller: AuthUser, owner_id: i64) -> bool {
    if caller.is_admin {
        return true;
    }
    !action.admin_only() && caller.id == owner_id
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("{action} is not allowed while {status}")]
    WrongState {
        action: &'static str,
        status: BookingStatus,
    },
    #[error("cannot cancel on/after start date")]
    CancelAfterStart,
    #[error("cannot request return before rental period starts")]
    ReturnBeforeStart,
    #[error("rental period has not elapsed")]
    NotElapsed,
}

fn wrong_state(action: &'static str, status: BookingStatus) -> TransitionError {
    TransitionError::WrongState { action, status }
}

/// Apply one transition of the booking state machine.
///
/// Pure: callers resolve `today` through `CivilClock` and persist the result
/// with a compare-and-set against the status this decision was made from.
/// Authorization is not this function's concern; handlers check
/// owner-or-admin (or admin-only) before calling in.
///
/// # Errors
/// Returns a `TransitionError` when the source state or a date rule forbids
/// the transition. Terminal states (`CLOSED`, `REJECTED`, `EXPIRED`) refuse
/// every action.
pub fn apply(
    status: BookingStatus,
    action: Action,
    start_date: NaiveDate,
    end_date: NaiveDate,
    today: NaiveDate,
    policy: LifecyclePolicy,
) -> Result<BookingStatus, TransitionError> {
    use BookingStatus::{Active, Closed, Pending, Rejected, ReturnRequested};

    match action {
        Action::Cancel => match status {
            Pending | Active => {
                if today >= start_date {
                    return Err(TransitionError::CancelAfterStart);
                }
                Ok(Closed)
            }
            other => Err(wrong_state("cancel", other)),
        },
        Action::RequestReturn => match status {
            Active => {
                if today < start_date {
                    return Err(TransitionError::ReturnBeforeStart);
                }
                Ok(ReturnRequested)
            }
            other => Err(wrong_state("request-return", other)),
        },
        Action::ConfirmReturn => match status {
            ReturnRequested => Ok(Closed),
            other => Err(wrong_state("confirm-return", other)),
        },
        Action::AdminApprove => match status {
            Pending => Ok(Active),
            other => Err(wrong_state("approve", other)),
        },
        Action::AdminReject => match status {
            Pending => Ok(Rejected),
            other => Err(wrong_state("reject", other)),
        },
        Action::ClockExpire => {
            if status.is_terminal() {
                return Err(wrong_state("expire", status));
            }
            if today <= end_date {
                return Err(TransitionError::NotElapsed);
            }
            Ok(policy.expire_target())
        }
    }
}
