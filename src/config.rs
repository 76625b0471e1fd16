use anyhow::Context;
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_port: u16,
    /// Civil-time offset used for every "today" decision. The reference
    /// deployment runs on Asia/Seoul time, hence the +9 default.
    pub tz_offset_hours: i32,
    /// When false the deployment has no distinct EXPIRED status and
    /// clock-driven expiration lands on CLOSED instead.
    pub distinct_expired_status: bool,
}

impl Config {
    /// Load configuration from environment variables, applying defaults where appropriate.
    ///
    /// # Errors
    /// Returns an error if mandatory variables (`DATABASE_URL`, `JWT_SECRET`) are missing,
    /// or if `TZ_OFFSET_HOURS` is outside a representable offset.
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let jwt_secret = std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        let server_port = std::env::var("SERVER_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(8080);
        let tz_offset_hours: i32 = std::env::var("TZ_OFFSET_HOURS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(9);
        if !(-23..=23).contains(&tz_offset_hours) {
            anyhow::bail!("TZ_OFFSET_HOURS must be between -23 and 23");
        }
        let distinct_expired_status = std::env::var("DISTINCT_EXPIRED_STATUS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(true);

        Ok(Self {
            database_url,
            jwt_secret,
            server_port,
            tz_offset_hours,
            distinct_expired_status,
        })
    }
}
