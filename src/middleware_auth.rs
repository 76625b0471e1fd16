use std::sync::Arc;

use axum::{body::Body, extract::State, http::Request, middleware::Next, response::Response};

use crate::{AppState, errors::AppError, models::AuthUser, utils::decode_jwt};

/// Authentication middleware validating JWT access tokens and resolving the
/// caller into an `AuthUser { id, is_admin }` request extension. The admin
/// flag is read from the database on every request so that a revoked admin
/// does not keep the capability for the lifetime of a token.
///
/// # Errors
/// Returns unauthorized if the token is missing, invalid, a refresh token,
/// or references a deleted user.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::Unauthorized)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AppError::Unauthorized)?;
    let claims = decode_jwt(token, &state.config)?;
    if claims.refresh {
        return Err(AppError::Unauthorized);
    }

    let key = claims.sub.to_string();
    if state.rate_limiter.check_key(&key).is_err() {
        return Err(AppError::Anyhow(anyhow::anyhow!("rate limit exceeded")));
    }

    let user = sqlx::query_as::<_, (i64, bool)>("SELECT id, is_admin FROM users WHERE id = $1")
        .bind(claims.sub)
        .fetch_optional(&state.db)
        .await?
        .ok_or(AppError::Unauthorized)?;

    req.extensions_mut().insert(AuthUser {
        id: user.0,
        is_admin: user.1,
    });

    Ok(next.run(req).await)
}
