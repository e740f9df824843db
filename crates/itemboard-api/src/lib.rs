pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod items;
pub mod middleware;
pub mod rate_limit;
pub mod routes;
pub mod seed;
pub mod state;
pub mod status;
pub mod tokens;
pub mod uploads;

pub use config::ApiConfig;
pub use routes::router;
pub use state::{AppState, AppStateInner};
