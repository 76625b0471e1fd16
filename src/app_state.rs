use crate::{Config, clock::CivilClock, lifecycle::LifecyclePolicy, utils::KeyedRateLimiter};
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    pub clock: CivilClock,
    pub lifecycle: LifecyclePolicy,
    pub rate_limiter: Arc<KeyedRateLimiter>,
}
