use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::{
    AppState,
    availability::{ACTIVE_STATUS_SQL, BlockedRange, expand_ranges, validate_range},
    errors::{AppError, AppResult},
    lifecycle::{self, Action},
    models::{
        AuthUser, AvailabilityResponse, Booking, BookingPage, BookingStatus, CreateBookingRequest,
    },
    pagination::{Cursor, paginate_window},
    sweeper,
};

fn ensure_owner_or_admin(booking: &Booking, user: AuthUser) -> AppResult<()> {
    if booking.user_id != user.id && !user.is_admin {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

fn ensure_admin(user: AuthUser) -> AppResult<()> {
    if !user.is_admin {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

async fn fetch_booking(state: &AppState, id: i64) -> AppResult<Booking> {
    sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or(AppError::NotFound)
}

/// Create a booking: validate the date range, snapshot the product's price
/// and deposit, reject overlapping dates, and insert as PENDING.
///
/// The overlap pre-check gives the friendly 409; the exclusion constraint on
/// the bookings table is what actually guarantees that two concurrent
/// overlapping creates cannot both commit, so a constraint violation on
/// insert maps to the same conflict error.
///
/// # Errors
/// Returns validation, not found, conflict, or database errors.
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateBookingRequest>,
) -> AppResult<(StatusCode, Json<Booking>)> {
    validate_range(payload.start_date, payload.end_date)?;

    let product = sqlx::query_as::<_, (i64, Option<i64>)>(
        "SELECT daily_price, deposit FROM products WHERE id = $1",
    )
    .bind(payload.product_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or(AppError::NotFound)?;
    let (daily_price, deposit) = product;

    let sql = format!(
        "SELECT EXISTS(SELECT 1 FROM bookings \
         WHERE product_id = $1 AND {ACTIVE_STATUS_SQL} \
           AND start_date < $2 AND end_date > $3)"
    );
    let overlaps = sqlx::query_scalar::<_, bool>(&sql)
        .bind(payload.product_id)
        .bind(payload.end_date)
        .bind(payload.start_date)
        .fetch_one(&state.db)
        .await?;
    if overlaps {
        return Err(AppError::Conflict(
            "this product is already booked for the selected dates".into(),
        ));
    }

    let days = (payload.end_date - payload.start_date).num_days();
    let total_price = daily_price * days;

    let booking = sqlx::query_as::<_, Booking>(
        "INSERT INTO bookings (user_id, product_id, start_date, end_date, status, total_price, deposit) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *",
    )
    .bind(user.id)
    .bind(payload.product_id)
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(BookingStatus::Pending)
    .bind(total_price)
    .bind(deposit)
    .fetch_one(&state.db)
    .await
    .map_err(|e| match &e {
        // 23P01: exclusion constraint violation, a concurrent create won.
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23P01") => AppError::Conflict(
            "this product is already booked for the selected dates".into(),
        ),
        _ => AppError::Database(e),
    })?;

    tracing::info!(
        booking_id = booking.id,
        product_id = booking.product_id,
        user_id = user.id,
        "booking created"
    );
    Ok((StatusCode::CREATED, Json(booking)))
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Check whether a product is free for `[start, end)`.
///
/// # Errors
/// Returns validation or database errors.
pub async fn check_availability(
    State(state): State<Arc<AppState>>,
    Path(product_id): Path<i64>,
    Query(query): Query<AvailabilityQuery>,
) -> AppResult<Json<AvailabilityResponse>> {
    validate_range(query.start, query.end)?;

    let sql = format!(
        "SELECT EXISTS(SELECT 1 FROM bookings \
         WHERE product_id = $1 AND {ACTIVE_STATUS_SQL} \
           AND start_date < $2 AND end_date > $3)"
    );
    let booked = sqlx::query_scalar::<_, bool>(&sql)
        .bind(product_id)
        .bind(query.end)
        .bind(query.start)
        .fetch_one(&state.db)
        .await?;

    Ok(Json(AvailabilityResponse { available: !booked }))
}

#[derive(Debug, Deserialize)]
pub struct BlockedDatesQuery {
    #[serde(default)]
    pub expand: bool,
}

/// All calendar-blocking ranges for a product: raw `[start, end)` pairs, or
/// the individual blocked dates when `expand=true`.
///
/// # Errors
/// Returns database errors.
pub async fn blocked_dates(
    State(state): State<Arc<AppState>>,
    Path(product_id): Path<i64>,
    Query(query): Query<BlockedDatesQuery>,
) -> AppResult<Json<serde_json::Value>> {
    let sql = format!(
        "SELECT start_date, end_date FROM bookings \
         WHERE product_id = $1 AND {ACTIVE_STATUS_SQL}"
    );
    let ranges: Vec<BlockedRange> = sqlx::query_as::<_, (NaiveDate, NaiveDate)>(&sql)
        .bind(product_id)
        .fetch_all(&state.db)
        .await?
        .into_iter()
        .map(|(start, end)| BlockedRange { start, end })
        .collect();

    let body = if query.expand {
        serde_json::to_value(expand_ranges(&ranges))
    } else {
        serde_json::to_value(&ranges)
    }
    .map_err(|e| AppError::Anyhow(e.into()))?;

    Ok(Json(body))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub skip: i64,
    pub limit: Option<i64>,
    #[serde(default)]
    pub include_inactive: bool,
}

/// List the caller's bookings newest first with offset windowing. Overdue
/// bookings are swept before the read so statuses are current.
///
/// # Errors
/// Returns database errors.
pub async fn list_my_bookings(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Vec<Booking>>> {
    let today = state.clock.today();
    sweeper::expire_overdue_for_user(&state.db, user.id, today, state.lifecycle).await?;

    let limit = query.limit.unwrap_or(50).clamp(1, 100);
    let skip = query.skip.max(0);

    let sql = format!(
        "SELECT * FROM bookings WHERE user_id = $1 \
           AND ($2::bool OR {ACTIVE_STATUS_SQL}) \
         ORDER BY id DESC OFFSET $3 LIMIT $4"
    );
    let bookings = sqlx::query_as::<_, Booking>(&sql)
        .bind(user.id)
        .bind(query.include_inactive)
        .bind(skip)
        .bind(limit)
        .fetch_all(&state.db)
        .await?;

    Ok(Json(bookings))
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub limit: Option<i64>,
    pub cursor: Option<String>,
    pub status: Option<BookingStatus>,
    #[serde(default)]
    pub include_inactive: bool,
}

/// Cursor-paginated listing of the caller's bookings.
///
/// An explicit `status` filter overrides `include_inactive`. The cursor
/// encodes the last-seen id; corrupt cursors restart from the beginning.
///
/// # Errors
/// Returns database errors.
pub async fn page_my_bookings(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<BookingPage>> {
    let today = state.clock.today();
    sweeper::expire_overdue_for_user(&state.db, user.id, today, state.lifecycle).await?;

    let limit = query.limit.unwrap_or(20).clamp(1, 100);
    let last_id = Cursor::decode(query.cursor.as_deref()).map(|c| c.last_id);

    // $3 encodes the filter override: with an explicit status filter the
    // inactive-set restriction is bypassed entirely.
    let sql = format!(
        "SELECT * FROM bookings WHERE user_id = $1 \
           AND ($2::text IS NULL OR status = $2) \
           AND ($2::text IS NOT NULL OR $3::bool OR {ACTIVE_STATUS_SQL}) \
           AND ($4::bigint IS NULL OR id < $4) \
         ORDER BY id DESC LIMIT $5"
    );
    let rows = sqlx::query_as::<_, Booking>(&sql)
        .bind(user.id)
        .bind(query.status.map(BookingStatus::as_str))
        .bind(query.include_inactive)
        .bind(last_id)
        .bind(limit + 1)
        .fetch_all(&state.db)
        .await?;

    let (items, next) = paginate_window(rows, limit as usize, |b| b.id);
    Ok(Json(BookingPage {
        items,
        next_cursor: next.map(Cursor::encode),
    }))
}

/// Get one booking, owner-or-admin only, with a single-item expiration check.
///
/// # Errors
/// Returns not found, forbidden, or database errors.
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<Booking>> {
    let booking = fetch_booking(&state, id).await?;
    ensure_owner_or_admin(&booking, user)?;

    let today = state.clock.today();
    let status = sweeper::expire_if_overdue(&state.db, &booking, today, state.lifecycle).await?;
    let booking = if status == booking.status {
        booking
    } else {
        fetch_booking(&state, id).await?
    };
    Ok(Json(booking))
}

/// Shared path for every status action: authorize, run the state machine
/// against the fetched status, then commit with a compare-and-set so that
/// two concurrent transitions cannot both win from the same stale state.
async fn transition(
    state: &AppState,
    user: AuthUser,
    booking_id: i64,
    action: Action,
) -> AppResult<Json<Booking>> {
    // Admin-only actions are refused before touching the database.
    if action.admin_only() {
        ensure_admin(user)?;
    }

    let booking = fetch_booking(state, booking_id).await?;
    if !lifecycle::is_authorized(action, user, booking.user_id) {
        return Err(AppError::Forbidden);
    }

    let next = lifecycle::apply(
        booking.status,
        action,
        booking.start_date,
        booking.end_date,
        state.clock.today(),
        state.lifecycle,
    )
    .map_err(|e| AppError::State(e.to_string()))?;

    let updated = sqlx::query_as::<_, Booking>(
        "UPDATE bookings SET status = $1, updated_at = now() \
         WHERE id = $2 AND status = $3 RETURNING *",
    )
    .bind(next)
    .bind(booking.id)
    .bind(booking.status)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::State("booking was modified concurrently".into()))?;

    tracing::info!(
        booking_id = updated.id,
        from = %booking.status,
        to = %updated.status,
        "booking transition"
    );
    Ok(Json(updated))
}

/// Cancel a PENDING or ACTIVE booking strictly before its start date.
///
/// # Errors
/// Returns not found, forbidden, state, or database errors.
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<Booking>> {
    transition(&state, user, id, Action::Cancel).await
}

/// Request return of an ACTIVE booking once its period has started.
///
/// # Errors
/// Returns not found, forbidden, state, or database errors.
pub async fn request_return(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<Booking>> {
    transition(&state, user, id, Action::RequestReturn).await
}

/// Confirm a requested return, closing the booking.
///
/// # Errors
/// Returns not found, forbidden, state, or database errors.
pub async fn confirm_return(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<Booking>> {
    transition(&state, user, id, Action::ConfirmReturn).await
}

/// Admin: approve a PENDING booking.
///
/// # Errors
/// Returns not found, forbidden, state, or database errors.
pub async fn admin_approve(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<Booking>> {
    transition(&state, user, id, Action::AdminApprove).await
}

/// Admin: reject a PENDING booking.
///
/// # Errors
/// Returns not found, forbidden, state, or database errors.
pub async fn admin_reject(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<Booking>> {
    transition(&state, user, id, Action::AdminReject).await
}

/// Admin: all PENDING bookings, newest first. Deliberately not swept:
/// pending bookings are not governed by elapsed-time rules until approved.
///
/// # Errors
/// Returns forbidden or database errors.
pub async fn admin_list_pending(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> AppResult<Json<Vec<Booking>>> {
    ensure_admin(user)?;

    let bookings = sqlx::query_as::<_, Booking>(
        "SELECT * FROM bookings WHERE status = 'PENDING' ORDER BY id DESC",
    )
    .fetch_all(&state.db)
    .await?;

    Ok(Json(bookings))
}
