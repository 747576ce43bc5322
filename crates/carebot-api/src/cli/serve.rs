//! `carebot serve`: run the HTTP/WebSocket server and the session sweeper
//! until Ctrl+C or SIGTERM.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use console::style;
use tokio_util::sync::CancellationToken;

use carebot_core::session::sweeper::SessionSweeper;
use carebot_types::config::ServiceConfig;

use crate::http::router::build_router;
use crate::state::AppState;

pub async fn serve(config: &ServiceConfig) -> Result<()> {
    let state = AppState::init(config).await?;
    let db_pool = state.db_pool.clone();

    tracing::info!(
        provider = %config.ai.provider,
        configured = state.chat_service.assistant().is_configured(),
        "AI assistant ready"
    );

    let shutdown = CancellationToken::new();
    let sweeper = SessionSweeper::spawn(
        Arc::clone(&state.sessions),
        Duration::from_secs(config.session.cleanup_interval_secs.max(1)),
        shutdown.clone(),
    );

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "Listening");

    println!(
        "  {} carebot listening on {}",
        style("⚡").bold(),
        style(format!("http://{addr}")).cyan()
    );
    println!("  {}", style("Press Ctrl+C to stop").dim());

    let router = build_router(state, &config.server.cors_origin);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    shutdown.cancel();
    if let Err(e) = sweeper.await {
        tracing::warn!(error = %e, "Session sweeper task ended abnormally");
    }
    db_pool.close().await;

    println!("\n  Server stopped.");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
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

    tracing::info!("Shutdown signal received");
}
