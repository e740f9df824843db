use std::sync::Arc;

use itemboard_db::Database;
use itemboard_gateway::Dispatcher;

use crate::cache::RecentCache;
use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult};
use crate::rate_limit::RateLimiter;

pub type AppState = Arc<AppStateInner>;

/// Everything a request handler can reach. Built once at startup and shared;
/// nothing here is a process global.
pub struct AppStateInner {
    pub db: Database,
    pub config: ApiConfig,
    pub dispatcher: Dispatcher,
    pub recent: RecentCache,
    pub api_limiter: RateLimiter,
    pub login_limiter: RateLimiter,
}

impl AppStateInner {
    pub fn new(db: Database, config: ApiConfig, dispatcher: Dispatcher) -> AppState {
        let api_limiter = RateLimiter::new(config.api_rate_limit, config.rate_limit_window);
        let login_limiter = RateLimiter::new(config.login_rate_limit, config.rate_limit_window);

        Arc::new(Self {
            db,
            config,
            dispatcher,
            recent: RecentCache::default(),
            api_limiter,
            login_limiter,
        })
    }
}

/// Run blocking database work off the async runtime. `context` becomes the
/// client-facing message if the work fails.
pub async fn run_db<F, T>(state: &AppState, context: &'static str, f: F) -> ApiResult<T>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(ApiError::internal(context))?
        .map_err(ApiError::internal(context))
}
