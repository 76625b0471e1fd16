pub mod app_state;
pub mod availability;
pub mod clock;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod handlers_bookings;
pub mod lifecycle;
pub mod middleware_auth;
pub mod models;
pub mod pagination;
pub mod sweeper;
pub mod utils;

pub use app_state::AppState;
pub use config::Config;
pub use errors::*;
pub use models::*;
pub use utils::*;
