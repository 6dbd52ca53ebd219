//! Upload processing pipeline
//!
//! An upload moves through these stages:
//!
//! ```text
//! Received → Validating → StrippingMetadata | Transcoding → Verifying → Committed
//!                                                  ↓ failed
//!                                    Fallback (verified MP3 only) → Committed
//!                                                  ↓ otherwise
//!                                              RolledBack
//! ```
//!
//! The raw upload is spooled under the configured temp directory. The encoder writes to
//! a hidden `.part` file inside the library directory, so the commit is a rename within
//! one filesystem. Temp files are held by `TempArtifact` guards and removed on every
//! exit path unless they were committed.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::LibraryError;
use crate::services::audio_format::{is_declared_mp3, is_supported_upload, sniff_mp3, spool_extension};
use crate::services::encoder::{AudioEncoder, EncodeMode, EncodeRequest};
use crate::services::library_fs::LibraryFs;

/// Temp file removed when dropped, unless persisted
#[derive(Debug)]
pub struct TempArtifact {
    path: Option<PathBuf>,
}

impl TempArtifact {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    pub fn path(&self) -> &Path {
        // Only `persist` takes the path, and it consumes self
        self.path.as_deref().unwrap_or_else(|| Path::new(""))
    }

    /// Keep the file; the caller now owns it
    pub fn persist(mut self) -> PathBuf {
        self.path.take().unwrap_or_default()
    }
}

impl Drop for TempArtifact {
    fn drop(&mut self) {
        let Some(path) = self.path.take() else {
            return;
        };

        match std::fs::remove_file(&path) {
            Ok(()) => debug!(path = %path.display(), "Removed temp file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove temp file"),
        }
    }
}

/// Raw upload bytes on disk plus what the client declared about them
#[derive(Debug)]
pub struct ReceivedUpload {
    pub temp: TempArtifact,
    pub original_name: Option<String>,
    pub content_type: Option<String>,
    pub size: u64,
}

/// Writes an incoming upload body to a temp file, enforcing the size ceiling
pub struct UploadSpool {
    temp: TempArtifact,
    file: tokio::fs::File,
    original_name: Option<String>,
    content_type: Option<String>,
    written: u64,
    max_bytes: u64,
}

impl UploadSpool {
    /// Create `upload-<uuid>[.ext]` in `temp_dir`, creating the directory if needed
    pub async fn create(
        temp_dir: &Path,
        original_name: Option<String>,
        content_type: Option<String>,
        max_bytes: u64,
    ) -> Result<Self, LibraryError> {
        tokio::fs::create_dir_all(temp_dir)
            .await
            .map_err(|e| LibraryError::Io {
                path: temp_dir.to_path_buf(),
                details: e.to_string(),
            })?;

        let mut name = format!("upload-{}", Uuid::new_v4());
        if let Some(ext) = spool_extension(original_name.as_deref()) {
            name.push('.');
            name.push_str(&ext);
        }
        let path = temp_dir.join(name);

        let file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| LibraryError::Io {
                path: path.clone(),
                details: e.to_string(),
            })?;

        debug!(path = %path.display(), "Spooling upload");

        Ok(Self {
            temp: TempArtifact::new(path),
            file,
            original_name,
            content_type,
            written: 0,
            max_bytes,
        })
    }

    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    /// Append a chunk; fails once the total passes the ceiling (the temp file is
    /// removed when the spool is dropped)
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), LibraryError> {
        self.written += chunk.len() as u64;
        if self.written > self.max_bytes {
            return Err(LibraryError::UploadTooLarge {
                limit_bytes: self.max_bytes,
            });
        }

        self.file
            .write_all(chunk)
            .await
            .map_err(|e| self.io_error(e))
    }

    /// Flush and close the file
    pub async fn finish(mut self) -> Result<ReceivedUpload, LibraryError> {
        self.file.flush().await.map_err(|e| self.io_error(e))?;
        self.file.sync_all().await.map_err(|e| self.io_error(e))?;

        Ok(ReceivedUpload {
            temp: self.temp,
            original_name: self.original_name,
            content_type: self.content_type,
            size: self.written,
        })
    }

    fn io_error(&self, err: std::io::Error) -> LibraryError {
        LibraryError::Io {
            path: self.temp.path().to_path_buf(),
            details: err.to_string(),
        }
    }
}

/// Received upload plus its target in the library
#[derive(Debug)]
pub struct UploadJob {
    pub upload: ReceivedUpload,
    /// Sanitized sound name, written as the `title` tag
    pub title: String,
    /// Library filename (`<title>.mp3`)
    pub filename: String,
}

/// Pipeline stage, for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStage {
    Received,
    Validating,
    StrippingMetadata,
    Transcoding,
    Verifying,
    Fallback,
    Committed,
    RolledBack,
}

/// How a committed upload was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Processing {
    /// Non-MP3 input re-encoded
    Transcoded,
    /// MP3 input, tags rewritten without re-encoding
    MetadataStripped,
    /// Processing failed, original MP3 bytes kept as-is
    CopiedVerbatim,
}

impl Processing {
    /// User-facing summary
    pub fn message(&self) -> &'static str {
        match self {
            Processing::Transcoded => "Sound converted to MP3 and added to the library",
            Processing::MetadataStripped => "Sound added to the library",
            Processing::CopiedVerbatim => {
                "Sound added to the library without processing (original MP3 kept)"
            }
        }
    }
}

/// Committed upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub filename: String,
    pub processing: Processing,
}

/// Turns received uploads into library entries
#[derive(Clone)]
pub struct UploadPipeline {
    library: LibraryFs,
    encoder: Arc<dyn AudioEncoder>,
    max_upload_bytes: u64,
}

impl UploadPipeline {
    pub fn new(library: LibraryFs, encoder: Arc<dyn AudioEncoder>, max_upload_bytes: u64) -> Self {
        Self {
            library,
            encoder,
            max_upload_bytes,
        }
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_bytes
    }

    /// Run a job to Committed or RolledBack
    ///
    /// The raw upload temp file is removed either way.
    pub async fn process(&self, job: UploadJob) -> Result<UploadOutcome, LibraryError> {
        let UploadJob {
            upload,
            title,
            filename,
        } = job;

        let mut stage = Stage::new(&filename);

        stage.enter(UploadStage::Validating);
        let target = match self.validate(&upload, &filename) {
            Ok(target) => target,
            Err(e) => {
                stage.enter(UploadStage::RolledBack);
                return Err(e);
            }
        };

        let already_mp3 = is_declared_mp3(upload.content_type.as_deref(), upload.original_name.as_deref())
            && sniff_mp3(upload.temp.path());

        let processed = TempArtifact::new(
            self.library
                .root()
                .join(format!(".upload-{}.part", Uuid::new_v4())),
        );

        let mode = if already_mp3 {
            stage.enter(UploadStage::StrippingMetadata);
            EncodeMode::StripMetadata
        } else {
            stage.enter(UploadStage::Transcoding);
            EncodeMode::Transcode
        };

        let request = EncodeRequest {
            input: upload.temp.path().to_path_buf(),
            output: processed.path().to_path_buf(),
            title,
            mode,
        };

        let processing = match self.encode_and_verify(&request, &mut stage).await {
            Ok(()) => match mode {
                EncodeMode::StripMetadata => Processing::MetadataStripped,
                EncodeMode::Transcode => Processing::Transcoded,
            },
            Err(details) if already_mp3 => {
                warn!(
                    filename = %filename,
                    encoder = self.encoder.name(),
                    error = %details,
                    "Processing failed, keeping original MP3"
                );
                stage.enter(UploadStage::Fallback);

                if let Err(e) = tokio::fs::copy(upload.temp.path(), processed.path()).await {
                    stage.enter(UploadStage::RolledBack);
                    return Err(LibraryError::ProcessingError {
                        details: format!("{}; fallback copy failed: {}", details, e),
                    });
                }
                Processing::CopiedVerbatim
            }
            Err(details) => {
                stage.enter(UploadStage::RolledBack);
                return Err(LibraryError::ProcessingError { details });
            }
        };

        // Another request may have claimed the name while the encoder ran
        if let Err(e) = self.library.rename(processed.path(), &target) {
            stage.enter(UploadStage::RolledBack);
            return Err(e.into());
        }
        processed.persist();

        stage.enter(UploadStage::Committed);
        info!(
            filename = %filename,
            bytes = upload.size,
            processing = ?processing,
            "Upload committed"
        );

        Ok(UploadOutcome {
            filename,
            processing,
        })
    }

    fn validate(&self, upload: &ReceivedUpload, filename: &str) -> Result<PathBuf, LibraryError> {
        if !is_supported_upload(upload.content_type.as_deref(), upload.original_name.as_deref()) {
            return Err(LibraryError::UnsupportedFormat {
                details: format!(
                    "type {} / file {} is not an accepted audio format",
                    upload.content_type.as_deref().unwrap_or("unknown"),
                    upload.original_name.as_deref().unwrap_or("unnamed"),
                ),
            });
        }

        if upload.size == 0 {
            return Err(LibraryError::InvalidRequest(
                "uploaded file is empty".to_string(),
            ));
        }

        if upload.size > self.max_upload_bytes {
            return Err(LibraryError::UploadTooLarge {
                limit_bytes: self.max_upload_bytes,
            });
        }

        let target = self.library.sound_path(filename)?;
        if self.library.exists(&target) {
            return Err(LibraryError::DuplicateName {
                filename: filename.to_string(),
            });
        }

        self.library.check_directory()?;

        Ok(target)
    }

    /// Run the encoder and confirm it left a non-empty file behind
    async fn encode_and_verify(
        &self,
        request: &EncodeRequest,
        stage: &mut Stage<'_>,
    ) -> Result<(), String> {
        self.encoder
            .encode(request)
            .await
            .map_err(|e| e.to_string())?;

        stage.enter(UploadStage::Verifying);
        match std::fs::metadata(&request.output) {
            Ok(meta) if meta.is_file() && meta.len() > 0 => Ok(()),
            Ok(_) => Err(format!(
                "{} reported success but produced an empty file",
                self.encoder.name()
            )),
            Err(e) => Err(format!(
                "{} reported success but produced no output: {}",
                self.encoder.name(),
                e
            )),
        }
    }
}

/// Logs stage transitions for one job
struct Stage<'a> {
    filename: &'a str,
    current: UploadStage,
}

impl<'a> Stage<'a> {
    fn new(filename: &'a str) -> Self {
        debug!(filename, stage = ?UploadStage::Received, "Upload stage");
        Self {
            filename,
            current: UploadStage::Received,
        }
    }

    fn enter(&mut self, next: UploadStage) {
        debug!(
            filename = self.filename,
            from = ?self.current,
            to = ?next,
            "Upload stage"
        );
        self.current = next;
    }
}
