mod cleanup;

use std::net::SocketAddr;
use std::path::PathBuf;

use tracing::{info, warn};

use itemboard_api::{ApiConfig, AppStateInner};
use itemboard_db::Database;
use itemboard_gateway::Dispatcher;

const CLEANUP_INTERVAL_SECS: u64 = 3600;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "itemboard=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let db_path: PathBuf = std::env::var("ITEMBOARD_DB_PATH")
        .unwrap_or_else(|_| "itemboard.db".into())
        .into();
    let host = std::env::var("ITEMBOARD_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("ITEMBOARD_PORT")
        .unwrap_or_else(|_| "3001".into())
        .parse()?;
    let config = ApiConfig::from_env()?;

    // Init database
    let db = Database::open(&db_path)?;

    match std::env::args().nth(1).as_deref() {
        None | Some("serve") => {}
        Some("seed") => {
            let report = tokio::task::spawn_blocking(move || itemboard_api::seed::seed(&db)).await??;
            info!(
                "Seed complete: {} users, {} items",
                report.users_created, report.items_created
            );
            return Ok(());
        }
        Some(other) => {
            eprintln!("Unknown command '{}'. Usage: itemboard [serve|seed]", other);
            std::process::exit(2);
        }
    }

    if config.uses_placeholder_secrets() {
        if config.production {
            eprintln!("FATAL: ITEMBOARD_JWT_SECRET / ITEMBOARD_REFRESH_SECRET are unset, placeholders or equal.");
            eprintln!("       Set two distinct secrets in your .env file and restart.");
            std::process::exit(1);
        }
        warn!("Using placeholder or shared token secrets; set distinct ITEMBOARD_JWT_SECRET and ITEMBOARD_REFRESH_SECRET");
    }

    let state = AppStateInner::new(db, config, Dispatcher::new());

    // Background cleanup task (runs every hour)
    tokio::spawn(cleanup::run_cleanup_loop(state.clone(), CLEANUP_INTERVAL_SECS));

    let app = itemboard_api::router(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Itemboard server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
