use chrono::NaiveDate;
use sqlx::PgPool;

use crate::availability::ACTIVE_STATUS_SQL;
use crate::lifecycle::LifecyclePolicy;
use crate::models::{Booking, BookingStatus};

/// Decide which of `bookings` have outlived their period as of `today`.
///
/// A booking expires only once `end_date` has fully elapsed — `today`
/// strictly after `end_date` — and only from a non-terminal status, which
/// makes repeated sweeps no-ops. Returns the ids to transition to the
/// deployment's expire target.
#[must_use]
pub fn sweep(bookings: &[Booking], today: NaiveDate) -> Vec<i64> {
    bookings
        .iter()
        .filter(|b| !b.status.is_terminal() && today > b.end_date)
        .map(|b| b.id)
        .collect()
}

/// Transition every overdue booking of one user before a read proceeds.
///
/// Lazy expiration: there is no background job, so staleness is bounded by
/// how recently the user has issued a read. Runs as a single guarded UPDATE,
/// which keeps it atomic with respect to concurrent user actions and
/// idempotent across racing reads. Other users' bookings are never touched.
///
/// # Errors
/// Propagates database errors.
pub async fn expire_overdue_for_user(
    pool: &PgPool,
    user_id: i64,
    today: NaiveDate,
    policy: LifecyclePolicy,
) -> Result<u64, sqlx::Error> {
    let sql = format!(
        "UPDATE bookings SET status = $1, updated_at = now() \
         WHERE user_id = $2 AND end_date < $3 AND {ACTIVE_STATUS_SQL}"
    );
    let result = sqlx::query(&sql)
        .bind(policy.expire_target())
        .bind(user_id)
        .bind(today)
        .execute(pool)
        .await?;

    if result.rows_affected() > 0 {
        tracing::debug!(
            user_id,
            expired = result.rows_affected(),
            "swept overdue bookings"
        );
    }
    Ok(result.rows_affected())
}

/// Single-item variant used by booking detail reads: expire this booking if
/// overdue and return its current status.
///
/// # Errors
/// Propagates database errors.
pub async fn expire_if_overdue(
    pool: &PgPool,
    booking: &Booking,
    today: NaiveDate,
    policy: LifecyclePolicy,
) -> Result<BookingStatus, sqlx::Error> {
    if booking.status.is_terminal() || today <= booking.end_date {
        return Ok(booking.status);
    }
    let target = policy.expire_target();
    // Compare-and-set: a concurrent transition wins and leaves this a no-op.
    let updated = sqlx::query_scalar::<_, i64>(
        "UPDATE bookings SET status = $1, updated_at = now() \
         WHERE id = $2 AND status = $3 RETURNING id",
    )
    .bind(target)
    .bind(booking.id)
    .bind(booking.status)
    .fetch_optional(pool)
    .await?;

    Ok(if updated.is_some() {
        target
    } else {
        booking.status
    })
}
