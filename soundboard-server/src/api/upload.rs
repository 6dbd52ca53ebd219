//! Upload API handler
//!
//! POST /api/upload, multipart fields `soundFile` (audio) and `soundName` (display name)

use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::Serialize;
use tracing::debug;

use crate::error::{ApiResult, LibraryError};
use crate::services::audio_format::is_supported_upload;
use crate::services::upload::{ReceivedUpload, UploadSpool};
use crate::AppState;

/// Multipart framing on top of the file itself
const MULTIPART_OVERHEAD_BYTES: u64 = 64 * 1024;

/// POST /api/upload response
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub filename: String,
    pub message: String,
}

fn multipart_error(limit_bytes: u64) -> impl Fn(MultipartError) -> LibraryError {
    move |e| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            LibraryError::UploadTooLarge { limit_bytes }
        } else {
            LibraryError::InvalidRequest(format!("malformed upload: {}", e.body_text()))
        }
    }
}

/// POST /api/upload
///
/// The file is streamed to a temp file as it arrives; the size ceiling and the format
/// allow-list are checked before the whole body has been read.
pub async fn upload_sound(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let limit = state.library.max_upload_bytes();
    let to_library_error = multipart_error(limit);

    let mut received: Option<ReceivedUpload> = None;
    let mut sound_name: Option<String> = None;

    while let Some(mut field) = multipart.next_field().await.map_err(&to_library_error)? {
        let field_name = field.name().map(str::to_string);

        match field_name.as_deref() {
            Some("soundFile") => {
                let original_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);

                // Browsers send an empty filename when no file was chosen
                if original_name.as_deref() == Some("") {
                    continue;
                }

                if !is_supported_upload(content_type.as_deref(), original_name.as_deref()) {
                    return Err(LibraryError::UnsupportedFormat {
                        details: format!(
                            "{} ({}) is not an accepted audio format",
                            original_name.as_deref().unwrap_or("upload"),
                            content_type.as_deref().unwrap_or("unknown type"),
                        ),
                    }
                    .into());
                }

                let mut spool = UploadSpool::create(
                    &state.config.upload_temp_path,
                    original_name,
                    content_type,
                    limit,
                )
                .await?;

                while let Some(chunk) = field.chunk().await.map_err(&to_library_error)? {
                    spool.write_chunk(&chunk).await?;
                }

                received = Some(spool.finish().await?);
            }
            Some("soundName") => {
                sound_name = Some(field.text().await.map_err(&to_library_error)?);
            }
            other => {
                debug!(field = ?other, "Ignoring unexpected upload field");
            }
        }
    }

    let upload = received
        .ok_or_else(|| LibraryError::InvalidRequest("soundFile is required".to_string()))?;
    let sound_name = sound_name
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| LibraryError::InvalidRequest("soundName is required".to_string()))?;

    let outcome = state.library.upload(upload, &sound_name).await?;

    Ok(Json(UploadResponse {
        success: true,
        message: outcome.processing.message().to_string(),
        filename: outcome.filename,
    }))
}

/// Build upload routes, with the body limit sized to the upload ceiling
pub fn upload_routes(max_upload_bytes: u64) -> Router<AppState> {
    let body_limit = max_upload_bytes.saturating_add(MULTIPART_OVERHEAD_BYTES);
    let body_limit = usize::try_from(body_limit).unwrap_or(usize::MAX);

    Router::new()
        .route("/api/upload", post(upload_sound))
        .layer(DefaultBodyLimit::max(body_limit))
}
