//! HTTP serving layer.
//!
//! - `POST /api/analyze`: multipart field `audio` → analysis envelope
//! - `GET /api/health`: model and chat backend status
//! - `GET /api/audio/{file}`: synthesized replies from the upload directory

pub mod routes;
pub mod state;

pub use routes::create_router;
pub use state::AppState;

use crate::config::Config;
use crate::error::{Result, VoiceError};
use crate::pipeline::Pipeline;

/// Bind, serve until Ctrl+C or SIGTERM, then drain in-flight requests.
pub async fn serve(config: &Config) -> Result<()> {
    std::fs::create_dir_all(&config.audio.upload_dir)?;

    let pipeline = Pipeline::from_config(config);
    let app = create_router(AppState::new(pipeline), &config.server.cors_origins);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(
        "listening on {addr}, artifacts in {}",
        config.audio.upload_dir.display()
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| VoiceError::Other(format!("server error: {e}")))?;

    tracing::info!("server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {e}");
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
                tracing::error!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
