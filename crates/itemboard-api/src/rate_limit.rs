//! Fixed-window rate limiting keyed by client IP.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use tokio::sync::Mutex;
use tracing::warn;

use crate::error::ApiError;
use crate::state::AppState;

/// Windows are swept once the table grows past this many clients.
const SWEEP_THRESHOLD: usize = 10_000;

#[derive(Debug)]
pub struct RateLimiter {
    windows: Mutex<HashMap<String, Window>>,
    max_requests: u32,
    window: Duration,
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            max_requests,
            window,
        }
    }

    /// Count one request for `key`. Returns `false` once the key has used up
    /// its budget for the current window.
    pub async fn check(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;

        if windows.len() > SWEEP_THRESHOLD {
            windows.retain(|_, w| now.duration_since(w.started) < self.window);
        }

        let entry = windows.entry(key.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.duration_since(entry.started) >= self.window {
            *entry = Window {
                started: now,
                count: 0,
            };
        }

        if entry.count >= self.max_requests {
            return false;
        }
        entry.count += 1;
        true
    }
}

/// Limit for every `/api` route.
pub async fn limit_api(State(state): State<AppState>, req: Request, next: Next) -> Result<Response, ApiError> {
    enforce(&state.api_limiter, "api", req, next).await
}

/// Additional, separately counted limit on login attempts.
pub async fn limit_login(State(state): State<AppState>, req: Request, next: Next) -> Result<Response, ApiError> {
    enforce(&state.login_limiter, "login", req, next).await
}

async fn enforce(limiter: &RateLimiter, scope: &str, req: Request, next: Next) -> Result<Response, ApiError> {
    let key = client_key(&req);
    if !limiter.check(&key).await {
        warn!("Rate limit ({}) exceeded for {}", scope, key);
        return Err(ApiError::RateLimited);
    }
    Ok(next.run(req).await)
}

/// Peer IP when the server was started with connect info, otherwise a shared
/// bucket.
fn client_key(req: &Request) -> String {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
