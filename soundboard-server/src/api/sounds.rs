//! Sound library API handlers
//!
//! GET /api/sounds, GET /sfx/:filename, POST /api/favorites/:filename,
//! POST /api/rename/:filename, DELETE /api/delete/:filename, GET /api/library-info

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, Path, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::error::{ApiError, ApiResult, LibraryError};
use crate::services::{LibraryInfo, SoundListing};
use crate::AppState;

/// POST /api/favorites/:filename response
#[derive(Debug, Serialize)]
pub struct ToggleFavoriteResponse {
    pub success: bool,
    pub favorite: bool,
}

/// POST /api/rename/:filename request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameRequest {
    pub new_name: Option<String>,
}

/// POST /api/rename/:filename response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameResponse {
    pub success: bool,
    pub new_filename: String,
}

/// DELETE /api/delete/:filename response
#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
}

/// GET /api/sounds
///
/// Lists library sounds and reconciles favorites against them. Errors carry the
/// config file path so the user knows where the library location comes from.
pub async fn list_sounds(State(state): State<AppState>) -> ApiResult<Json<SoundListing>> {
    state
        .library
        .list()
        .await
        .map(Json)
        .map_err(|e| ApiError::from(e).with_config_path(state.config.config_path()))
}

/// GET /sfx/:filename
///
/// Streams the audio file, with range support. 404 for anything that is not a
/// library sound.
pub async fn serve_sound(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    request: Request,
) -> Response {
    let path = match state.library.sound_path(&filename) {
        Ok(path) => path,
        Err(e) => {
            tracing::debug!(filename = %filename, error = %e, "Sound not served");
            return (StatusCode::NOT_FOUND, "File not found").into_response();
        }
    };

    match ServeFile::new(path).oneshot(request).await {
        Ok(response) => response.map(Body::new),
        Err(never) => match never {},
    }
}

/// POST /api/favorites/:filename
pub async fn toggle_favorite(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> ApiResult<Json<ToggleFavoriteResponse>> {
    let favorite = state.library.toggle_favorite(&filename).await?;

    Ok(Json(ToggleFavoriteResponse {
        success: true,
        favorite,
    }))
}

/// POST /api/rename/:filename
///
/// Body `{"newName": "..."}`. The new name is sanitized; a trailing `.mp3` is allowed.
pub async fn rename_sound(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    body: Result<Json<RenameRequest>, JsonRejection>,
) -> ApiResult<Json<RenameResponse>> {
    let Json(request) =
        body.map_err(|e| LibraryError::InvalidRequest(format!("invalid rename body: {}", e)))?;

    let new_name = request
        .new_name
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| LibraryError::InvalidRequest("newName is required".to_string()))?;

    let new_filename = state.library.rename(&filename, &new_name).await?;

    Ok(Json(RenameResponse {
        success: true,
        new_filename,
    }))
}

/// DELETE /api/delete/:filename
pub async fn delete_sound(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    state.library.delete(&filename).await?;
    Ok(Json(DeleteResponse { success: true }))
}

/// GET /api/library-info
///
/// Failures include the configured paths for diagnostics.
pub async fn library_info(State(state): State<AppState>) -> ApiResult<Json<LibraryInfo>> {
    state
        .library
        .library_info()
        .map(Json)
        .map_err(|e| {
            ApiError::from(e)
                .with_paths(state.library.paths())
                .with_config_path(state.config.config_path())
        })
}

/// Build sound library routes
pub fn sound_routes() -> Router<AppState> {
    Router::new()
        .route("/api/sounds", get(list_sounds))
        .route("/sfx/:filename", get(serve_sound))
        .route("/api/favorites/:filename", post(toggle_favorite))
        .route("/api/rename/:filename", post(rename_sound))
        .route("/api/delete/:filename", delete(delete_sound))
        .route("/api/library-info", get(library_info))
}
