use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use validator::Validate;

use crate::{
    AppState,
    errors::{AppError, AppResult},
    models::{
        AuthUser, Booking, BookingStatus, CheckoutRequest, CheckoutResponse, CreateProductRequest,
        CreateReviewRequest, LoginRequest, Product, RegisterRequest, Review, ReviewSummary,
        TokenResponse, User, UserResponse,
    },
    utils::{create_jwt_tokens, hash_password, verify_password},
};

/// Health check endpoint.
#[must_use]
#[allow(clippy::unused_async)]
pub async fn health_check() -> &'static str {
    "OK"
}

/// Register a new user.
///
/// # Errors
/// Returns validation errors, hashing errors, or database errors.
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<UserResponse>)> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let password_hash = hash_password(&payload.password)?;

    let user = sqlx::query_as::<_, User>(
        "INSERT INTO users (email, password_hash) VALUES ($1, $2) \
         RETURNING id, email, password_hash, is_admin, created_at",
    )
    .bind(&payload.email)
    .bind(&password_hash)
    .fetch_one(&state.db)
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Conflict("email already registered".into())
        }
        _ => AppError::Database(e),
    })?;

    Ok((
        StatusCode::CREATED,
        Json(UserResponse {
            id: user.id,
            email: user.email,
            is_admin: user.is_admin,
        }),
    ))
}

/// Authenticate a user and return JWT tokens.
///
/// # Errors
/// Returns validation, invalid credentials, or database errors.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<(StatusCode, Json<TokenResponse>)> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let user = sqlx::query_as::<_, User>(
        "SELECT id, email, password_hash, is_admin, created_at FROM users WHERE email = $1",
    )
    .bind(&payload.email)
    .fetch_optional(&state.db)
    .await?;

    let user = user.ok_or(AppError::InvalidCredentials)?;

    if !verify_password(&payload.password, &user.password_hash)? {
        return Err(AppError::InvalidCredentials);
    }

    let (access, refresh) = create_jwt_tokens(user.id, &state.config)?;
    Ok((
        StatusCode::OK,
        Json(TokenResponse {
            access_token: access,
            refresh_token: refresh,
        }),
    ))
}

/// Refresh JWT tokens using a refresh token.
///
/// # Errors
/// Returns unauthorized errors or token decoding errors.
#[allow(clippy::unused_async)]
pub async fn refresh_token(
    State(state): State<Arc<AppState>>,
    Json(body): Json<TokenResponse>,
) -> AppResult<Json<TokenResponse>> {
    let claims = crate::utils::decode_jwt(&body.refresh_token, &state.config)?;
    if !claims.refresh {
        return Err(AppError::Unauthorized);
    }
    let (access, refresh) = create_jwt_tokens(claims.sub, &state.config)?;
    Ok(Json(TokenResponse {
        access_token: access,
        refresh_token: refresh,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ProductListQuery {
    pub q: Option<String>,
    pub category: Option<String>,
    pub region: Option<String>,
    pub page: Option<u32>,
    pub size: Option<u32>,
}

/// List products, newest first, with optional search and category/region
/// filters and page/size windowing.
///
/// # Errors
/// Returns database errors.
pub async fn list_products(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ProductListQuery>,
) -> AppResult<Json<Vec<Product>>> {
    let size = i64::from(query.size.unwrap_or(20).clamp(1, 100));
    let page = i64::from(query.page.unwrap_or(1).max(1));
    let offset = (page - 1) * size;

    let products = sqlx::query_as::<_, Product>(
        "SELECT * FROM products \
         WHERE ($1::text IS NULL OR name ILIKE '%' || $1 || '%' OR description ILIKE '%' || $1 || '%') \
           AND ($2::text IS NULL OR category = $2) \
           AND ($3::text IS NULL OR region = $3) \
         ORDER BY id DESC LIMIT $4 OFFSET $5",
    )
    .bind(&query.q)
    .bind(&query.category)
    .bind(&query.region)
    .bind(size)
    .bind(offset)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(products))
}

/// Create a product listed by the authenticated user.
///
/// # Errors
/// Returns validation or database errors.
pub async fn create_product(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateProductRequest>,
) -> AppResult<(StatusCode, Json<Product>)> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let product = sqlx::query_as::<_, Product>(
        "INSERT INTO products (owner_id, name, description, daily_price, deposit, category, region) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *",
    )
    .bind(user.id)
    .bind(&payload.name)
    .bind(&payload.description)
    .bind(payload.daily_price)
    .bind(payload.deposit)
    .bind(&payload.category)
    .bind(&payload.region)
    .fetch_one(&state.db)
    .await?;

    Ok((StatusCode::CREATED, Json(product)))
}

/// Get a single product by id.
///
/// # Errors
/// Returns not found or database errors.
pub async fn get_product(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> AppResult<Json<Product>> {
    let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or(AppError::NotFound)?;

    Ok(Json(product))
}

/// Simulated payment checkout: derives the amount from the booking's price
/// snapshot unless the caller supplies one, and echoes it back. No booking
/// state changes and no settlement happen here.
///
/// # Errors
/// Returns not found, forbidden, or database errors.
pub async fn checkout(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CheckoutRequest>,
) -> AppResult<Json<CheckoutResponse>> {
    let booking = sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = $1")
        .bind(payload.booking_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or(AppError::NotFound)?;

    // Payment stays strictly between the renter and the processor.
    if booking.user_id != user.id {
        return Err(AppError::Forbidden);
    }

    let expected = booking.total_price + booking.deposit.unwrap_or(0);
    let charged = payload.amount.unwrap_or(expected);

    Ok(Json(CheckoutResponse {
        ok: true,
        booking_id: booking.id,
        charged_amount: charged,
        method: payload.method.unwrap_or_else(|| "mock".into()),
        message: "payment completed (simulated)".into(),
    }))
}

/// Create a review for one of the caller's closed bookings.
///
/// Reviews are gated on `CLOSED` exactly: an `EXPIRED` booking was never
/// returned and confirmed, so it is not reviewable.
///
/// # Errors
/// Returns validation, not found, forbidden, state, or conflict errors.
pub async fn create_review(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateReviewRequest>,
) -> AppResult<(StatusCode, Json<Review>)> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let booking = sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = $1")
        .bind(payload.booking_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or(AppError::NotFound)?;

    if booking.user_id != user.id {
        return Err(AppError::Forbidden);
    }
    if booking.status != BookingStatus::Closed {
        return Err(AppError::State(
            "you can review only after the booking is closed".into(),
        ));
    }

    let review = sqlx::query_as::<_, Review>(
        "INSERT INTO reviews (booking_id, product_id, user_id, rating, comment) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING id, booking_id, product_id, user_id, rating, comment, created_at",
    )
    .bind(booking.id)
    .bind(booking.product_id)
    .bind(user.id)
    .bind(payload.rating)
    .bind(&payload.comment)
    .fetch_one(&state.db)
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Conflict("review already exists for this booking".into())
        }
        _ => AppError::Database(e),
    })?;

    Ok((StatusCode::CREATED, Json(review)))
}

/// List reviews for a product, newest first.
///
/// # Errors
/// Returns database errors.
pub async fn list_product_reviews(
    State(state): State<Arc<AppState>>,
    Path(product_id): Path<i64>,
) -> AppResult<Json<Vec<Review>>> {
    let reviews = sqlx::query_as::<_, Review>(
        "SELECT id, booking_id, product_id, user_id, rating, comment, created_at \
         FROM reviews WHERE product_id = $1 ORDER BY id DESC",
    )
    .bind(product_id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(reviews))
}

/// Review count and average rating for a product.
///
/// # Errors
/// Returns database errors.
pub async fn review_summary(
    State(state): State<Arc<AppState>>,
    Path(product_id): Path<i64>,
) -> AppResult<Json<ReviewSummary>> {
    let (count, average) = sqlx::query_as::<_, (i64, Option<f64>)>(
        "SELECT COUNT(*), AVG(rating)::float8 FROM reviews WHERE product_id = $1",
    )
    .bind(product_id)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(ReviewSummary { count, average }))
}
