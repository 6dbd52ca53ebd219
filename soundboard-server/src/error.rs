//! Error types for soundboard-server
//!
//! `LibraryError` is the single taxonomy every service operation reports. Each kind has
//! a stable wire name (`kind()`) and HTTP status so the UI can render guidance for it.
//! `ApiError` wraps a `LibraryError` with request-specific diagnostics (config path,
//! library paths) and renders the JSON error body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::services::library::LibraryPaths;

/// Library operation error
#[derive(Debug, Error)]
pub enum LibraryError {
    /// Library directory does not exist (500)
    #[error("Sound library directory not found: {}", .path.display())]
    DirectoryNotFound { path: PathBuf },

    /// Library directory exists but cannot be read (500)
    #[error("Permission denied reading sound library: {}", .path.display())]
    DirectoryAccessDenied { path: PathBuf },

    /// Any other failure reading the library directory (500)
    #[error("Error reading sound library {}: {details}", .path.display())]
    DirectoryReadError { path: PathBuf, details: String },

    /// Favorites document exists but is unreadable or corrupt (500)
    #[error("Favorites file is unreadable or corrupt {}: {details}", .path.display())]
    FavoritesFileError { path: PathBuf, details: String },

    /// Favorites document could not be written (500 when fatal)
    #[error("Could not save favorites to {}: {details}", .path.display())]
    FavoritesSaveError { path: PathBuf, details: String },

    /// Target filename already taken (400)
    #[error("A sound named \"{filename}\" already exists")]
    DuplicateName { filename: String },

    /// Sound file does not exist (404)
    #[error("Sound not found: {filename}")]
    NotFound { filename: String },

    /// Name empty after sanitizing, or filename unusable (400)
    #[error("Invalid name \"{name}\": {reason}")]
    InvalidName { name: String, reason: String },

    /// Upload is not an accepted audio format (400)
    #[error("Unsupported file type: {details}")]
    UnsupportedFormat { details: String },

    /// Encoding or commit of an upload failed (500)
    #[error("Failed to process audio: {details}")]
    ProcessingError { details: String },

    /// Upload exceeds the configured ceiling (413)
    #[error("Upload exceeds the maximum size of {limit_bytes} bytes")]
    UploadTooLarge { limit_bytes: u64 },

    /// Malformed request (400)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Unexpected filesystem failure on a single sound (500)
    #[error("File operation failed on {}: {details}", .path.display())]
    Io { path: PathBuf, details: String },
}

impl LibraryError {
    /// Stable error identifier sent to clients
    pub fn kind(&self) -> &'static str {
        match self {
            LibraryError::DirectoryNotFound { .. } => "DirectoryNotFound",
            LibraryError::DirectoryAccessDenied { .. } => "DirectoryAccessDenied",
            LibraryError::DirectoryReadError { .. } => "DirectoryReadError",
            LibraryError::FavoritesFileError { .. } => "FavoritesFileError",
            LibraryError::FavoritesSaveError { .. } => "FavoritesSaveError",
            LibraryError::DuplicateName { .. } => "DuplicateName",
            LibraryError::NotFound { .. } => "NotFound",
            LibraryError::InvalidName { .. } => "InvalidName",
            LibraryError::UnsupportedFormat { .. } => "UnsupportedFormat",
            LibraryError::ProcessingError { .. } => "ProcessingError",
            LibraryError::UploadTooLarge { .. } => "UploadTooLarge",
            LibraryError::InvalidRequest(_) => "InvalidRequest",
            LibraryError::Io { .. } => "IoError",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            LibraryError::DuplicateName { .. }
            | LibraryError::InvalidName { .. }
            | LibraryError::UnsupportedFormat { .. }
            | LibraryError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            LibraryError::NotFound { .. } => StatusCode::NOT_FOUND,
            LibraryError::UploadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            LibraryError::DirectoryNotFound { .. }
            | LibraryError::DirectoryAccessDenied { .. }
            | LibraryError::DirectoryReadError { .. }
            | LibraryError::FavoritesFileError { .. }
            | LibraryError::FavoritesSaveError { .. }
            | LibraryError::ProcessingError { .. }
            | LibraryError::Io { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Offending path, when the error is about one
    pub fn path(&self) -> Option<&Path> {
        match self {
            LibraryError::DirectoryNotFound { path }
            | LibraryError::DirectoryAccessDenied { path }
            | LibraryError::DirectoryReadError { path, .. }
            | LibraryError::FavoritesFileError { path, .. }
            | LibraryError::FavoritesSaveError { path, .. }
            | LibraryError::Io { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Underlying system message, when there is one
    pub fn details(&self) -> Option<&str> {
        match self {
            LibraryError::DirectoryReadError { details, .. }
            | LibraryError::FavoritesFileError { details, .. }
            | LibraryError::FavoritesSaveError { details, .. }
            | LibraryError::UnsupportedFormat { details }
            | LibraryError::ProcessingError { details }
            | LibraryError::Io { details, .. } => Some(details),
            LibraryError::InvalidName { reason, .. } => Some(reason),
            _ => None,
        }
    }
}

/// JSON error body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    /// Error kind identifier
    pub error: &'static str,
    /// Human-readable message
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paths: Option<LibraryPaths>,
}

/// Error returned by HTTP handlers
#[derive(Debug)]
pub struct ApiError {
    pub error: LibraryError,
    config_path: Option<PathBuf>,
    paths: Option<LibraryPaths>,
}

impl ApiError {
    /// Attach the config file path so the UI can point the user at it
    pub fn with_config_path(mut self, config_path: Option<&Path>) -> Self {
        self.config_path = config_path.map(Path::to_path_buf);
        self
    }

    /// Attach the configured library paths for diagnostic display
    pub fn with_paths(mut self, paths: LibraryPaths) -> Self {
        self.paths = Some(paths);
        self
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            error: self.error.kind(),
            message: self.error.to_string(),
            path: self.error.path().map(|p| p.display().to_string()),
            config_path: self.config_path.as_ref().map(|p| p.display().to_string()),
            details: self.error.details().map(str::to_string),
            paths: self.paths.clone(),
        }
    }
}

impl From<LibraryError> for ApiError {
    fn from(error: LibraryError) -> Self {
        Self {
            error,
            config_path: None,
            paths: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.error.status_code();

        if status.is_server_error() {
            tracing::error!(kind = self.error.kind(), error = %self.error, "Request failed");
        } else {
            tracing::debug!(kind = self.error.kind(), error = %self.error, "Request rejected");
        }

        (status, Json(self.body())).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
