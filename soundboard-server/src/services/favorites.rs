//! Favorites persistence
//!
//! Favorites live in a single pretty-printed JSON object mapping library filename to a
//! boolean flag. The document only holds metadata; it never decides whether a sound
//! exists. `reconcile` brings its key set back in line with the library directory.
//!
//! Every mutation runs as one load-modify-save cycle under the store's write lock, so
//! concurrent requests in this process never interleave their cycles. Saves go to a
//! sibling temp file that is renamed over the document.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::LibraryError;

/// Filename → favorite flag, ordered for stable output
pub type FavoritesMap = BTreeMap<String, bool>;

/// Favorites document errors
#[derive(Debug, Error)]
pub enum FavoritesError {
    /// Document exists but cannot be read or parsed
    #[error("Favorites file error {}: {details}", .path.display())]
    File { path: PathBuf, details: String },

    /// Document could not be written
    #[error("Favorites save error {}: {details}", .path.display())]
    Save { path: PathBuf, details: String },
}

impl From<FavoritesError> for LibraryError {
    fn from(err: FavoritesError) -> Self {
        match err {
            FavoritesError::File { path, details } => {
                LibraryError::FavoritesFileError { path, details }
            }
            FavoritesError::Save { path, details } => {
                LibraryError::FavoritesSaveError { path, details }
            }
        }
    }
}

/// Result of one load-modify-save cycle
///
/// A failed save does not lose the modified mapping; callers decide whether the
/// failure is fatal (`saved`) or only worth a warning (`warn_unsaved`).
#[derive(Debug)]
pub struct FavoritesUpdate {
    pub favorites: FavoritesMap,
    pub changed: bool,
    pub save_error: Option<FavoritesError>,
}

impl FavoritesUpdate {
    /// Treat a failed save as an error
    pub fn saved(self) -> Result<FavoritesMap, FavoritesError> {
        match self.save_error {
            Some(err) => Err(err),
            None => Ok(self.favorites),
        }
    }

    /// Log a failed save and carry on with the in-memory mapping
    pub fn warn_unsaved(self, operation: &str) -> FavoritesMap {
        if let Some(err) = &self.save_error {
            warn!(operation, error = %err, "Favorites not saved, continuing");
        }
        self.favorites
    }
}

/// Add missing filenames as `false` and drop keys with no file
///
/// Returns the reconciled mapping and whether anything changed. No I/O.
pub fn reconcile(current_files: &[String], favorites: &FavoritesMap) -> (FavoritesMap, bool) {
    let mut reconciled = FavoritesMap::new();
    for file in current_files {
        let flag = favorites.get(file).copied().unwrap_or(false);
        reconciled.insert(file.clone(), flag);
    }

    let changed = reconciled.len() != favorites.len()
        || reconciled.keys().any(|k| !favorites.contains_key(k));

    (reconciled, changed)
}

/// JSON-backed favorites store
#[derive(Debug, Clone)]
pub struct FavoritesStore {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl FavoritesStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the document; a missing document is an empty mapping
    pub fn load(&self) -> Result<FavoritesMap, FavoritesError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No favorites file yet");
                return Ok(FavoritesMap::new());
            }
            Err(e) => {
                return Err(FavoritesError::File {
                    path: self.path.clone(),
                    details: e.to_string(),
                })
            }
        };

        serde_json::from_str(&content).map_err(|e| FavoritesError::File {
            path: self.path.clone(),
            details: e.to_string(),
        })
    }

    /// Write the whole mapping, creating parent directories as needed
    pub fn save(&self, favorites: &FavoritesMap) -> Result<(), FavoritesError> {
        let save_error = |details: String| FavoritesError::Save {
            path: self.path.clone(),
            details,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| save_error(e.to_string()))?;
        }

        let mut json =
            serde_json::to_string_pretty(favorites).map_err(|e| save_error(e.to_string()))?;
        json.push('\n');

        let staging = self.staging_path();
        if let Err(e) = std::fs::write(&staging, json) {
            let _ = std::fs::remove_file(&staging);
            return Err(save_error(e.to_string()));
        }

        std::fs::rename(&staging, &self.path).map_err(|e| {
            let _ = std::fs::remove_file(&staging);
            save_error(e.to_string())
        })?;

        debug!(path = %self.path.display(), entries = favorites.len(), "Saved favorites");
        Ok(())
    }

    /// Run one serialized load-modify-save cycle
    ///
    /// `modify` returns whether it changed the mapping; unchanged mappings are not
    /// written. A load failure aborts before `modify` runs. File I/O runs on the
    /// blocking pool while the write lock is held.
    pub async fn update<F>(&self, modify: F) -> Result<FavoritesUpdate, FavoritesError>
    where
        F: FnOnce(&mut FavoritesMap) -> bool,
    {
        let _guard = self.write_lock.lock().await;

        let mut favorites = self.load_blocking().await?;
        let changed = modify(&mut favorites);

        let save_error = if changed {
            self.save_blocking(favorites.clone()).await.err()
        } else {
            None
        };

        Ok(FavoritesUpdate {
            favorites,
            changed,
            save_error,
        })
    }

    /// Reconcile against the current library listing and persist if it changed
    pub async fn sync(&self, current_files: &[String]) -> Result<FavoritesUpdate, FavoritesError> {
        self.update(|favorites| {
            let (reconciled, changed) = reconcile(current_files, favorites);
            *favorites = reconciled;
            changed
        })
        .await
    }

    /// Flip the flag for `filename` and persist it
    ///
    /// An absent entry counts as `false`, so the first toggle marks it favorite.
    pub async fn toggle(&self, filename: &str) -> Result<bool, FavoritesError> {
        let mut new_value = false;

        self.update(|favorites| {
            new_value = !favorites.get(filename).copied().unwrap_or(false);
            favorites.insert(filename.to_string(), new_value);
            true
        })
        .await?
        .saved()?;

        Ok(new_value)
    }

    async fn load_blocking(&self) -> Result<FavoritesMap, FavoritesError> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.load())
            .await
            .map_err(|e| FavoritesError::File {
                path: self.path.clone(),
                details: format!("load task failed: {}", e),
            })?
    }

    async fn save_blocking(&self, favorites: FavoritesMap) -> Result<(), FavoritesError> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.save(&favorites))
            .await
            .map_err(|e| FavoritesError::Save {
                path: self.path.clone(),
                details: format!("save task failed: {}", e),
            })?
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "favorites.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
