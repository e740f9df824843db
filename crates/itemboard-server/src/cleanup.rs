use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use itemboard_api::AppState;

/// Background task that drops refresh tokens past their expiry. Expired
/// tokens are already rejected at refresh time; this only keeps the table
/// from growing.
pub async fn run_cleanup_loop(state: AppState, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        let db_state = Arc::clone(&state);
        let purged = tokio::task::spawn_blocking(move || db_state.db.purge_expired_refresh_tokens()).await;

        match purged {
            Ok(Ok(count)) => {
                if count > 0 {
                    info!("Cleanup: purged {} expired refresh tokens", count);
                }
            }
            Ok(Err(e)) => warn!("Cleanup error: {}", e),
            Err(e) => warn!("Cleanup task failed: {}", e),
        }
    }
}
