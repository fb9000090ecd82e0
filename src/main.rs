use anyhow::Context;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{error, info};

use video_downloader_web::utils::logging::init_tracing;
use video_downloader_web::{commands, AppState, ServerConfig, NAME, VERSION};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    info!("🚀 Starting {} v{}", NAME, VERSION);

    let config = ServerConfig::load().map_err(|e| {
        error!("❌ Failed to load configuration: {:#}", e);
        e
    })?;
    let bind_addr = config.server.bind_addr.clone();

    let state = AppState::new(config).context("Failed to initialize application state")?;
    let housekeeping = state.spawn_housekeeping();

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {bind_addr}"))?;
    info!("🌐 Listening on http://{}", listener.local_addr()?);

    axum::serve(
        listener,
        commands::router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("HTTP server error")?;

    housekeeping.shutdown();
    info!("👋 Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
