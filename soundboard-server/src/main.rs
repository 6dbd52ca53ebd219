//! soundboard-server - personal soundboard web server
//!
//! Serves a directory of MP3 clips with a small JSON API for listing, favorites,
//! rename, delete and upload (with ffmpeg transcoding), plus the static browser UI.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use soundboard_common::config::ConfigResolver;
use soundboard_server::services::FfmpegEncoder;
use soundboard_server::{build_router, AppState};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "soundboard-server")]
#[command(about = "Personal soundboard web server")]
#[command(version)]
struct Cli {
    /// Config file (JSON); overrides the default lookup
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Sound library directory; overrides the config file
    #[arg(short, long)]
    library: Option<PathBuf>,

    /// Port to listen on; overrides the config file
    #[arg(short, long, env = "SOUNDBOARD_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!(
        "Starting soundboard-server v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let cli = Cli::parse();

    let mut config = ConfigResolver::new(cli.config).resolve();
    if let Some(library) = cli.library {
        config.library_path = library;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }

    match config.config_path() {
        Some(path) => info!("Config file: {}", path.display()),
        None => info!("Config file: none (compiled defaults)"),
    }
    info!("Sound library: {}", config.library_path.display());
    info!("Favorites file: {}", config.favorites_path.display());
    info!("Public assets: {}", config.public_path.display());

    if !config.library_path.is_dir() {
        warn!(
            path = %config.library_path.display(),
            "Sound library directory is missing; listing will report DirectoryNotFound"
        );
    }

    let encoder = FfmpegEncoder::new(config.ffmpeg_path.clone(), config.transcode_timeout);
    if encoder.is_available().await {
        info!("✓ Encoder available: {}", encoder.binary());
    } else {
        warn!(
            binary = encoder.binary(),
            "ffmpeg not found; non-MP3 uploads will fail, MP3 uploads are stored unprocessed"
        );
    }

    let bind_address = config.bind_address();
    let state = AppState::new(config, Arc::new(encoder));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_address))?;
    info!("Listening on http://{}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C (or SIGTERM on unix)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
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
                warn!(error = %e, "Failed to install SIGTERM handler");
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
