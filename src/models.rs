use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Booking lifecycle states, stored as TEXT.
///
/// `Pending`, `Active` and `ReturnRequested` block the product's calendar;
/// the inactive states do not. Whether expiration lands on `Expired` or
/// `Closed` is a deployment choice resolved at startup (see `LifecyclePolicy`).
#[derive(sqlx::Type, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Active,
    ReturnRequested,
    Closed,
    Rejected,
    Expired,
}

impl BookingStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Active => "ACTIVE",
            Self::ReturnRequested => "RETURN_REQUESTED",
            Self::Closed => "CLOSED",
            Self::Rejected => "REJECTED",
            Self::Expired => "EXPIRED",
        }
    }

    /// Terminal states admit no further transition.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Rejected | Self::Expired)
    }

    /// Inactive states no longer reserve the calendar. Same set as the
    /// terminal states in this deployment; kept as a separate predicate
    /// because the overlap checker and the state machine depend on it for
    /// different reasons.
    #[must_use]
    pub fn is_inactive(self) -> bool {
        self.is_terminal()
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(sqlx::FromRow, Debug, Clone)]
#[allow(dead_code)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

/// Caller identity resolved by the auth middleware: everything the booking
/// core needs to know about who is asking.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub id: i64,
    pub is_admin: bool,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct Product {
    pub id: i64,
    pub owner_id: Option<i64>,
    pub name: String,
    pub description: Option<String>,
    pub daily_price: i64,
    pub deposit: Option<i64>,
    pub category: Option<String>,
    pub region: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct Booking {
    pub id: i64,
    pub user_id: i64,
    pub product_id: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: BookingStatus,
    pub total_price: i64,
    pub deposit: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct Review {
    pub id: i64,
    pub booking_id: i64,
    pub product_id: i64,
    pub user_id: i64,
    pub rating: i32,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub exp: usize,
    pub refresh: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub email: String,
    pub is_admin: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub description: Option<String>,
    #[validate(range(min = 0))]
    pub daily_price: i64,
    #[validate(range(min = 0))]
    pub deposit: Option<i64>,
    pub category: Option<String>,
    pub region: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub product_id: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    pub available: bool,
}

#[derive(Debug, Serialize)]
pub struct BookingPage {
    pub items: Vec<Booking>,
    pub next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub booking_id: i64,
    pub amount: Option<i64>,
    pub method: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub ok: bool,
    pub booking_id: i64,
    pub charged_amount: i64,
    pub method: String,
    pub message: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateReviewRequest {
    pub booking_id: i64,
    #[validate(range(min = 1, max = 5))]
    pub rating: i32,
    #[validate(length(max = 2000))]
    pub comment: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReviewSummary {
    pub count: i64,
    pub average: Option<f64>,
}
