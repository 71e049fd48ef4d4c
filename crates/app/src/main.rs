//! DineWheel - pick a restaurant together
//!
//! Headless host: serves rooms over TCP until interrupted.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use dinewheel_core::{SessionManager, Storage};
use dinewheel_net::Server;

mod config;
mod state;

use config::AppConfig;
use state::AppState;

/// How often idle rooms are looked for while serving
const SWEEP_INTERVAL: Duration = Duration::from_secs(600);

fn main() {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tracing::info!("Starting DineWheel");

    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = match AppConfig::load(config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let db_path = match config.database_path() {
        Ok(path) => path,
        Err(e) => {
            tracing::error!("Failed to resolve database path: {}", e);
            std::process::exit(1);
        }
    };

    let app_state = match AppState::new(&config, &db_path) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!("Failed to create tokio runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(serve(&config, app_state)) {
        tracing::error!("Server failed: {}", e);
        std::process::exit(1);
    }
}

async fn serve(config: &AppConfig, app_state: AppState) -> dinewheel_net::Result<()> {
    let sweeper = config
        .room_idle()
        .map(|max_idle| tokio::spawn(sweep_idle_rooms(app_state.sessions.clone(), max_idle)));

    let server = Server::start(
        config.port,
        app_state.sessions,
        app_state.hub,
        config.max_peers,
    )
    .await?;

    tracing::info!(addr = %server.addr(), "Accepting connections, Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;

    server.shutdown();
    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }
    tracing::info!("DineWheel stopped");
    Ok(())
}

/// Close rooms nobody has touched within `max_idle`, every sweep interval
async fn sweep_idle_rooms<S: Storage + 'static>(
    sessions: Arc<SessionManager<S>>,
    max_idle: Duration,
) {
    loop {
        tokio::time::sleep(SWEEP_INTERVAL).await;

        let sessions = sessions.clone();
        match tokio::task::spawn_blocking(move || sessions.close_idle_rooms(max_idle)).await {
            Ok(Ok(closed)) => tracing::debug!(closed = closed.len(), "Idle room sweep done"),
            Ok(Err(e)) => tracing::warn!(error = %e, "Idle room sweep failed"),
            Err(e) => tracing::error!(error = %e, "Idle room sweep task failed"),
        }
    }
}
