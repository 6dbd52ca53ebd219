//! soundboard-server library interface
//!
//! Exposes the router and services for the binary and for integration tests.

pub mod api;
pub mod error;
pub mod services;

pub use crate::error::{ApiError, ApiResult, LibraryError};

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::{services::ServeDir, trace::TraceLayer};

use soundboard_common::SoundboardConfig;

use crate::services::{AudioEncoder, FfmpegEncoder, SoundLibrary};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub library: Arc<SoundLibrary>,
    /// Resolved configuration, including where it was loaded from
    pub config: Arc<SoundboardConfig>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    /// State with an explicit encoder
    pub fn new(config: SoundboardConfig, encoder: Arc<dyn AudioEncoder>) -> Self {
        let library = SoundLibrary::new(
            config.library_path.clone(),
            config.favorites_path.clone(),
            encoder,
            config.max_upload_bytes,
        );

        Self {
            library: Arc::new(library),
            config: Arc::new(config),
            startup_time: Utc::now(),
        }
    }

    /// State using the configured ffmpeg binary
    pub fn from_config(config: SoundboardConfig) -> Self {
        let encoder = FfmpegEncoder::new(config.ffmpeg_path.clone(), config.transcode_timeout);
        Self::new(config, Arc::new(encoder))
    }
}

/// Build application router
///
/// API routes first; anything else is looked up in the public (UI) directory.
pub fn build_router(state: AppState) -> Router {
    let public = ServeDir::new(&state.config.public_path);

    Router::new()
        .merge(api::sound_routes())
        .merge(api::upload_routes(state.config.max_upload_bytes))
        .merge(api::health_routes())
        .fallback_service(public)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
