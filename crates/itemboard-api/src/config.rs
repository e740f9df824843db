use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

/// Secrets that ship as defaults and must never sign production tokens.
pub const PLACEHOLDER_SECRETS: &[&str] = &["dev-access-secret-change-me", "dev-refresh-secret-change-me"];

/// Runtime settings for the HTTP layer. Server-level settings (bind address,
/// database path) live in the binary.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub jwt_secret: String,
    pub refresh_secret: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub upload_dir: PathBuf,
    /// Pre-built client bundle served for non-API paths.
    pub static_dir: Option<PathBuf>,
    /// Hides error detail from 500 responses.
    pub production: bool,
    /// Randomly delay some listing requests to mimic a slow backend.
    pub simulate_latency: bool,
    pub max_upload_bytes: usize,
    pub rate_limit_window: Duration,
    pub api_rate_limit: u32,
    pub login_rate_limit: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            jwt_secret: PLACEHOLDER_SECRETS[0].into(),
            refresh_secret: PLACEHOLDER_SECRETS[1].into(),
            access_ttl: Duration::from_secs(5 * 60),
            refresh_ttl: Duration::from_secs(7 * 24 * 60 * 60),
            upload_dir: PathBuf::from("./uploads"),
            static_dir: None,
            production: false,
            simulate_latency: true,
            max_upload_bytes: 10 * 1024 * 1024,
            rate_limit_window: Duration::from_secs(15 * 60),
            api_rate_limit: 100,
            login_rate_limit: 1000,
        }
    }
}

impl ApiConfig {
    /// Read `ITEMBOARD_*` variables, falling back to the defaults above.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            jwt_secret: env_or("ITEMBOARD_JWT_SECRET", defaults.jwt_secret)?,
            refresh_secret: env_or("ITEMBOARD_REFRESH_SECRET", defaults.refresh_secret)?,
            access_ttl: Duration::from_secs(env_or(
                "ITEMBOARD_ACCESS_TTL_SECS",
                defaults.access_ttl.as_secs(),
            )?),
            refresh_ttl: Duration::from_secs(env_or(
                "ITEMBOARD_REFRESH_TTL_SECS",
                defaults.refresh_ttl.as_secs(),
            )?),
            upload_dir: env_or("ITEMBOARD_UPLOAD_DIR", defaults.upload_dir)?,
            static_dir: std::env::var("ITEMBOARD_STATIC_DIR")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            production: env_or("ITEMBOARD_ENV", "development".to_string())? == "production",
            simulate_latency: env_or("ITEMBOARD_SIMULATE_LATENCY", defaults.simulate_latency)?,
            max_upload_bytes: env_or("ITEMBOARD_MAX_UPLOAD_BYTES", defaults.max_upload_bytes)?,
            rate_limit_window: defaults.rate_limit_window,
            api_rate_limit: env_or("ITEMBOARD_API_RATE_LIMIT", defaults.api_rate_limit)?,
            login_rate_limit: env_or("ITEMBOARD_LOGIN_RATE_LIMIT", defaults.login_rate_limit)?,
        })
    }

    /// Also true when both secrets are equal: an access token would then
    /// verify as a refresh token.
    pub fn uses_placeholder_secrets(&self) -> bool {
        self.jwt_secret == self.refresh_secret
            || [&self.jwt_secret, &self.refresh_secret]
                .iter()
                .any(|s| s.is_empty() || PLACEHOLDER_SECRETS.contains(&s.as_str()))
    }
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value '{}'", key, raw)),
        _ => Ok(default),
    }
}
