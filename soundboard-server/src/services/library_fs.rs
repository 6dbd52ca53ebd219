//! Filesystem access to the sound library directory
//!
//! All operations are blocking `std::fs` calls; each one completes before returning, so
//! a rename or delete is never observed half-done by the same request.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::error::LibraryError;

/// Extension every library entry carries
pub const SOUND_EXTENSION: &str = "mp3";

/// Library filesystem errors
#[derive(Debug, Error)]
pub enum FsError {
    #[error("Directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("Permission denied: {}", .0.display())]
    DirectoryAccessDenied(PathBuf),

    #[error("Cannot read directory {}: {message}", .path.display())]
    DirectoryReadError { path: PathBuf, message: String },

    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("File already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error("Invalid sound filename: {0}")]
    InvalidFilename(String),

    #[error("File access error {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<FsError> for LibraryError {
    fn from(err: FsError) -> Self {
        match err {
            FsError::DirectoryNotFound(path) => LibraryError::DirectoryNotFound { path },
            FsError::DirectoryAccessDenied(path) => LibraryError::DirectoryAccessDenied { path },
            FsError::DirectoryReadError { path, message } => LibraryError::DirectoryReadError {
                path,
                details: message,
            },
            FsError::NotFound(path) => LibraryError::NotFound {
                filename: file_name_of(&path),
            },
            FsError::AlreadyExists(path) => LibraryError::DuplicateName {
                filename: file_name_of(&path),
            },
            FsError::InvalidFilename(name) => LibraryError::InvalidName {
                name,
                reason: "not a sound filename in the library".to_string(),
            },
            FsError::Io { path, source } => LibraryError::Io {
                path,
                details: source.to_string(),
            },
        }
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// True when `name` ends in `.mp3`, ignoring case
pub fn has_sound_extension(name: &str) -> bool {
    Path::new(name)
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case(SOUND_EXTENSION))
        .unwrap_or(false)
}

/// Gateway to the configured library directory
#[derive(Debug, Clone)]
pub struct LibraryFs {
    root: PathBuf,
}

impl LibraryFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a client-supplied filename to its path inside the library
    ///
    /// Rejects anything that could escape the directory or is not an `.mp3` name.
    pub fn sound_path(&self, filename: &str) -> Result<PathBuf, FsError> {
        let suspicious = filename.is_empty()
            || filename.contains('/')
            || filename.contains('\\')
            || filename.contains('\0')
            || filename.starts_with('.');

        if suspicious || !has_sound_extension(filename) {
            return Err(FsError::InvalidFilename(filename.to_string()));
        }

        Ok(self.root.join(filename))
    }

    /// Fail unless the library directory exists and is a directory
    pub fn check_directory(&self) -> Result<(), FsError> {
        match std::fs::metadata(&self.root) {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(FsError::DirectoryReadError {
                path: self.root.clone(),
                message: "path is not a directory".to_string(),
            }),
            Err(e) => Err(self.directory_error(e)),
        }
    }

    /// List `.mp3` filenames in the library, sorted case-insensitively
    ///
    /// Hidden files (leading `.`) are skipped, which also hides in-progress uploads.
    pub fn list_audio_files(&self) -> Result<Vec<String>, FsError> {
        let entries = std::fs::read_dir(&self.root).map_err(|e| self.directory_error(e))?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| self.directory_error(e))?;

            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(raw) => {
                    tracing::warn!(name = ?raw, "Skipping library entry with non UTF-8 name");
                    continue;
                }
            };

            if name.starts_with('.') || !has_sound_extension(&name) {
                continue;
            }

            // Follows symlinks so linked clips are listed too
            if entry.path().is_file() {
                files.push(name);
            }
        }

        files.sort_by(|a, b| {
            a.to_lowercase()
                .cmp(&b.to_lowercase())
                .then_with(|| a.cmp(b))
        });

        tracing::debug!(
            library = %self.root.display(),
            count = files.len(),
            "Listed library files"
        );

        Ok(files)
    }

    pub fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    /// Rename without clobbering an existing destination
    pub fn rename(&self, from: &Path, to: &Path) -> Result<(), FsError> {
        if from == to {
            return Ok(());
        }
        if !from.exists() {
            return Err(FsError::NotFound(from.to_path_buf()));
        }
        if to.exists() {
            return Err(FsError::AlreadyExists(to.to_path_buf()));
        }

        std::fs::rename(from, to).map_err(|source| match source.kind() {
            ErrorKind::NotFound => FsError::NotFound(from.to_path_buf()),
            _ => FsError::Io {
                path: from.to_path_buf(),
                source,
            },
        })
    }

    pub fn delete(&self, path: &Path) -> Result<(), FsError> {
        if !path.is_file() {
            return Err(FsError::NotFound(path.to_path_buf()));
        }

        std::fs::remove_file(path).map_err(|source| match source.kind() {
            ErrorKind::NotFound => FsError::NotFound(path.to_path_buf()),
            _ => FsError::Io {
                path: path.to_path_buf(),
                source,
            },
        })
    }

    pub fn size_of(&self, path: &Path) -> Result<u64, FsError> {
        std::fs::metadata(path)
            .map(|meta| meta.len())
            .map_err(|source| match source.kind() {
                ErrorKind::NotFound => FsError::NotFound(path.to_path_buf()),
                _ => FsError::Io {
                    path: path.to_path_buf(),
                    source,
                },
            })
    }

    fn directory_error(&self, err: std::io::Error) -> FsError {
        match err.kind() {
            ErrorKind::NotFound => FsError::DirectoryNotFound(self.root.clone()),
            ErrorKind::PermissionDenied => FsError::DirectoryAccessDenied(self.root.clone()),
            _ => FsError::DirectoryReadError {
                path: self.root.clone(),
                message: err.to_string(),
            },
        }
    }
}
