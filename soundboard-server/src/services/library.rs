//! Library service
//!
//! Every operation re-reads the directory and the favorites document; nothing is cached
//! between requests. Operations that touch both run the filesystem step first and the
//! favorites step second. A favorites failure after a successful file operation is
//! logged and not rolled back, since the next listing reconciles the document anyway.

use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use soundboard_common::format_human_size;

use crate::error::LibraryError;
use crate::services::encoder::AudioEncoder;
use crate::services::favorites::{FavoritesMap, FavoritesStore};
use crate::services::library_fs::LibraryFs;
use crate::services::naming::target_for;
use crate::services::upload::{ReceivedUpload, UploadJob, UploadOutcome, UploadPipeline};

/// Library sounds and their favorite flags
#[derive(Debug, Clone, Serialize)]
pub struct SoundListing {
    pub sounds: Vec<String>,
    pub favorites: FavoritesMap,
}

/// Configured locations, reported for diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryPaths {
    pub library_path: String,
    pub favorites_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LibrarySize {
    pub bytes: u64,
    pub formatted: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryInfo {
    pub library_size: LibrarySize,
    pub paths: LibraryPaths,
    pub file_count: usize,
}

/// Target filenames with an upload in progress
#[derive(Debug, Default)]
struct InFlight {
    names: Mutex<HashSet<String>>,
}

impl InFlight {
    fn reserve(self: &Arc<Self>, filename: &str) -> Result<Reservation, LibraryError> {
        let mut names = self.names.lock().unwrap_or_else(|e| e.into_inner());
        if !names.insert(filename.to_string()) {
            return Err(LibraryError::DuplicateName {
                filename: filename.to_string(),
            });
        }

        Ok(Reservation {
            owner: Arc::clone(self),
            filename: filename.to_string(),
        })
    }
}

/// Releases the name when the upload finishes
struct Reservation {
    owner: Arc<InFlight>,
    filename: String,
}

impl Drop for Reservation {
    fn drop(&mut self) {
        let mut names = self.owner.names.lock().unwrap_or_else(|e| e.into_inner());
        names.remove(&self.filename);
    }
}

/// Sound library operations
pub struct SoundLibrary {
    fs: LibraryFs,
    favorites: FavoritesStore,
    pipeline: UploadPipeline,
    in_flight: Arc<InFlight>,
}

impl SoundLibrary {
    pub fn new(
        library_path: impl Into<PathBuf>,
        favorites_path: impl Into<PathBuf>,
        encoder: Arc<dyn AudioEncoder>,
        max_upload_bytes: u64,
    ) -> Self {
        let fs = LibraryFs::new(library_path);
        let pipeline = UploadPipeline::new(fs.clone(), encoder, max_upload_bytes);

        Self {
            fs,
            favorites: FavoritesStore::new(favorites_path),
            pipeline,
            in_flight: Arc::new(InFlight::default()),
        }
    }

    pub fn library_path(&self) -> &Path {
        self.fs.root()
    }

    pub fn favorites_path(&self) -> &Path {
        self.favorites.path()
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.pipeline.max_upload_bytes()
    }

    pub fn paths(&self) -> LibraryPaths {
        LibraryPaths {
            library_path: self.fs.root().display().to_string(),
            favorites_path: self.favorites.path().display().to_string(),
        }
    }

    /// Path of a library sound, for serving its bytes
    pub fn sound_path(&self, filename: &str) -> Result<PathBuf, LibraryError> {
        let path = self.fs.sound_path(filename)?;
        if !path.is_file() {
            return Err(LibraryError::NotFound {
                filename: filename.to_string(),
            });
        }
        Ok(path)
    }

    /// List sounds and reconcile the favorites document against them
    pub async fn list(&self) -> Result<SoundListing, LibraryError> {
        let sounds = self.fs.list_audio_files()?;
        let favorites = self.favorites.sync(&sounds).await?.warn_unsaved("list");

        Ok(SoundListing { sounds, favorites })
    }

    /// Commit an upload under its sanitized name and register it as not favorite
    pub async fn upload(
        &self,
        upload: ReceivedUpload,
        sound_name: &str,
    ) -> Result<UploadOutcome, LibraryError> {
        let (title, filename) = target_for(sound_name)?;
        let _reservation = self.in_flight.reserve(&filename)?;

        let outcome = self
            .pipeline
            .process(UploadJob {
                upload,
                title,
                filename,
            })
            .await?;

        // A stale entry left by a file removed outside the server must not carry its flag
        let added = outcome.filename.clone();
        match self
            .favorites
            .update(move |favorites| favorites.insert(added, false) != Some(false))
            .await
        {
            Ok(update) => {
                update.warn_unsaved("upload");
            }
            Err(e) => warn!(filename = %outcome.filename, error = %e, "Favorites not updated after upload"),
        }

        Ok(outcome)
    }

    /// Rename a sound, carrying its favorite flag to the new filename
    ///
    /// Returns the new filename.
    pub async fn rename(&self, filename: &str, new_name: &str) -> Result<String, LibraryError> {
        let source = self.fs.sound_path(filename)?;
        let (_, new_filename) = target_for(new_name)?;
        let destination = self.fs.sound_path(&new_filename)?;

        if !self.fs.exists(&source) {
            return Err(LibraryError::NotFound {
                filename: filename.to_string(),
            });
        }
        if source == destination {
            return Ok(new_filename);
        }

        self.fs.rename(&source, &destination)?;
        info!(from = %filename, to = %new_filename, "Renamed sound");

        let old_key = filename.to_string();
        let new_key = new_filename.clone();
        let migrate = self
            .favorites
            .update(move |favorites| {
                let flag = favorites.remove(&old_key).unwrap_or(false);
                favorites.insert(new_key, flag);
                true
            })
            .await;

        match migrate {
            Ok(update) => {
                update.warn_unsaved("rename");
            }
            Err(e) => warn!(from = %filename, to = %new_filename, error = %e, "Favorites not migrated after rename"),
        }

        Ok(new_filename)
    }

    /// Delete a sound and its favorites entry
    pub async fn delete(&self, filename: &str) -> Result<(), LibraryError> {
        let path = self.fs.sound_path(filename)?;
        self.fs.delete(&path)?;
        info!(filename = %filename, "Deleted sound");

        let key = filename.to_string();
        match self
            .favorites
            .update(move |favorites| favorites.remove(&key).is_some())
            .await
        {
            Ok(update) => {
                update.warn_unsaved("delete");
            }
            Err(e) => warn!(filename = %filename, error = %e, "Favorites not updated after delete"),
        }

        Ok(())
    }

    /// Flip a sound's favorite flag; returns the new value
    pub async fn toggle_favorite(&self, filename: &str) -> Result<bool, LibraryError> {
        self.fs.sound_path(filename)?;
        let favorite = self.favorites.toggle(filename).await?;
        info!(filename = %filename, favorite, "Toggled favorite");
        Ok(favorite)
    }

    /// Total size and count of library sounds
    pub fn library_info(&self) -> Result<LibraryInfo, LibraryError> {
        let files = self.fs.list_audio_files()?;

        let mut bytes = 0u64;
        for file in &files {
            let path = self.fs.root().join(file);
            match self.fs.size_of(&path) {
                Ok(size) => bytes += size,
                // Removed between listing and stat
                Err(e) => warn!(filename = %file, error = %e, "Skipping file in size total"),
            }
        }

        Ok(LibraryInfo {
            library_size: LibrarySize {
                bytes,
                formatted: format_human_size(bytes),
            },
            paths: self.paths(),
            file_count: files.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::encoder::{EncodeRequest, EncoderError};
    use crate::services::upload::UploadSpool;

    struct CopyEncoder;

    #[async_trait::async_trait]
    impl AudioEncoder for CopyEncoder {
        fn name(&self) -> &'static str {
            "copy"
        }

        async fn encode(&self, request: &EncodeRequest) -> Result<(), EncoderError> {
            std::fs::copy(&request.input, &request.output).map_err(EncoderError::Spawn)?;
            Ok(())
        }
    }

    fn library() -> (tempfile::TempDir, SoundLibrary) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sfx")).unwrap();
        let lib = SoundLibrary::new(
            dir.path().join("sfx"),
            dir.path().join("data/favorites.json"),
            Arc::new(CopyEncoder),
            1024 * 1024,
        );
        (dir, lib)
    }

    async fn wav_upload(dir: &tempfile::TempDir) -> ReceivedUpload {
        let mut spool = UploadSpool::create(
            &dir.path().join("tmp"),
            Some("clip.wav".to_string()),
            Some("audio/wav".to_string()),
            1024 * 1024,
        )
        .await
        .unwrap();
        spool.write_chunk(b"RIFF\x24\x00\x00\x00WAVEfmt data").await.unwrap();
        spool.finish().await.unwrap()
    }

    #[test]
    fn test_reservation_blocks_same_name_until_dropped() {
        let in_flight = Arc::new(InFlight::default());

        let first = in_flight.reserve("a.mp3").unwrap();
        assert!(matches!(
            in_flight.reserve("a.mp3"),
            Err(LibraryError::DuplicateName { .. })
        ));
        assert!(in_flight.reserve("b.mp3").is_ok());

        drop(first);
        assert!(in_flight.reserve("a.mp3").is_ok());
    }

    #[tokio::test]
    async fn test_upload_registers_favorite_false() {
        let (dir, lib) = library();

        let outcome = lib.upload(wav_upload(&dir).await, "My Sound!").await.unwrap();
        assert_eq!(outcome.filename, "My Sound.mp3");

        let favorites = FavoritesStore::new(lib.favorites_path()).load().unwrap();
        assert_eq!(favorites.get("My Sound.mp3"), Some(&false));
    }

    #[tokio::test]
    async fn test_upload_resets_stale_favorite_entry() {
        let (dir, lib) = library();
        std::fs::create_dir_all(dir.path().join("data")).unwrap();
        std::fs::write(lib.favorites_path(), r#"{"Clip.mp3": true}"#).unwrap();

        lib.upload(wav_upload(&dir).await, "Clip").await.unwrap();

        let favorites = FavoritesStore::new(lib.favorites_path()).load().unwrap();
        assert_eq!(favorites.get("Clip.mp3"), Some(&false));
    }

    /// Staging path occupied by a directory, so every favorites save fails
    fn block_favorites_saves(dir: &tempfile::TempDir) {
        std::fs::create_dir_all(dir.path().join("data/favorites.json.tmp")).unwrap();
    }

    #[tokio::test]
    async fn test_unsaved_favorites_do_not_fail_file_operations() {
        let (dir, lib) = library();
        std::fs::write(dir.path().join("sfx/a.mp3"), b"ID3").unwrap();
        std::fs::write(dir.path().join("sfx/b.mp3"), b"ID3").unwrap();
        block_favorites_saves(&dir);

        let listing = lib.list().await.unwrap();
        assert_eq!(listing.sounds, vec!["a.mp3".to_string(), "b.mp3".to_string()]);
        assert_eq!(listing.favorites.get("a.mp3"), Some(&false));
        assert_eq!(listing.favorites.get("b.mp3"), Some(&false));
        assert!(!lib.favorites_path().exists());

        assert_eq!(lib.rename("a.mp3", "c").await.unwrap(), "c.mp3");
        assert!(dir.path().join("sfx/c.mp3").is_file());

        lib.delete("b.mp3").await.unwrap();
        assert!(!dir.path().join("sfx/b.mp3").exists());

        let outcome = lib.upload(wav_upload(&dir).await, "New Clip").await.unwrap();
        assert!(dir.path().join("sfx").join(&outcome.filename).is_file());
    }

    #[tokio::test]
    async fn test_unsaved_toggle_is_an_error() {
        let (dir, lib) = library();
        std::fs::write(dir.path().join("sfx/a.mp3"), b"ID3").unwrap();
        block_favorites_saves(&dir);

        assert!(matches!(
            lib.toggle_favorite("a.mp3").await,
            Err(LibraryError::FavoritesSaveError { .. })
        ));
    }

    #[tokio::test]
    async fn test_upload_with_unusable_name_is_invalid() {
        let (dir, lib) = library();

        let err = lib.upload(wav_upload(&dir).await, "!!!").await.unwrap_err();
        assert!(matches!(err, LibraryError::InvalidName { .. }));
    }

    #[tokio::test]
    async fn test_rename_migrates_flag() {
        let (dir, lib) = library();
        std::fs::write(dir.path().join("sfx/a.mp3"), b"ID3").unwrap();
        lib.toggle_favorite("a.mp3").await.unwrap();

        let new_filename = lib.rename("a.mp3", "b").await.unwrap();
        assert_eq!(new_filename, "b.mp3");

        let favorites = FavoritesStore::new(lib.favorites_path()).load().unwrap();
        assert_eq!(favorites.get("b.mp3"), Some(&true));
        assert!(!favorites.contains_key("a.mp3"));
    }

    #[tokio::test]
    async fn test_rename_to_same_name_is_noop() {
        let (dir, lib) = library();
        std::fs::write(dir.path().join("sfx/a.mp3"), b"ID3").unwrap();

        assert_eq!(lib.rename("a.mp3", "a.mp3").await.unwrap(), "a.mp3");
        assert!(dir.path().join("sfx/a.mp3").exists());
    }

    #[tokio::test]
    async fn test_toggle_rejects_path_like_names() {
        let (_dir, lib) = library();
        assert!(matches!(
            lib.toggle_favorite("../secret.mp3").await,
            Err(LibraryError::InvalidName { .. })
        ));
    }

    #[test]
    fn test_library_info_sums_sizes() {
        let (dir, lib) = library();
        std::fs::write(dir.path().join("sfx/a.mp3"), vec![0u8; 1024]).unwrap();
        std::fs::write(dir.path().join("sfx/b.mp3"), vec![0u8; 512]).unwrap();
        std::fs::write(dir.path().join("sfx/notes.txt"), vec![0u8; 4096]).unwrap();

        let info = lib.library_info().unwrap();
        assert_eq!(info.file_count, 2);
        assert_eq!(info.library_size.bytes, 1536);
        assert_eq!(info.library_size.formatted, "1.5 KB");

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["librarySize"]["bytes"], 1536);
        assert!(json["paths"]["libraryPath"].as_str().unwrap().ends_with("sfx"));
        assert_eq!(json["fileCount"], 2);
    }
}
