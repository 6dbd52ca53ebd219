//! Configuration loading and path resolution
//!
//! The config file is a single JSON document. Every key is optional; anything missing
//! falls back to the compiled default for the current platform. A missing or broken
//! config file never stops startup: the resolver logs a warning and uses defaults.
//!
//! Config file lookup order:
//! 1. Explicit path (command-line argument)
//! 2. `SOUNDBOARD_CONFIG` environment variable
//! 3. `<user config dir>/soundboard/config.json`
//! 4. `./config.json`

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "SOUNDBOARD_CONFIG";

/// Environment variable overriding the library directory
pub const LIBRARY_ENV_VAR: &str = "SOUNDBOARD_LIBRARY";

const CONFIG_FILE_NAME: &str = "config.json";
const APP_DIR_NAME: &str = "soundboard";

/// Raw config file contents, as written by the user
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFile {
    pub library_path: Option<String>,
    pub favorites_path: Option<String>,
    pub public_path: Option<String>,
    pub upload_temp_path: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub max_upload_bytes: Option<u64>,
    pub ffmpeg_path: Option<String>,
    pub transcode_timeout_secs: Option<u64>,
}

/// OS-dependent compiled defaults
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub library_path: PathBuf,
    pub favorites_path: PathBuf,
    pub public_path: PathBuf,
    pub upload_temp_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: u64,
    pub ffmpeg_path: String,
    pub transcode_timeout_secs: u64,
}

impl CompiledDefaults {
    /// Defaults for the platform this binary was built for
    pub fn for_current_platform() -> Self {
        // ~/Music/soundboard where an audio dir exists, ~/soundboard otherwise
        let library_path = dirs::audio_dir()
            .or_else(dirs::home_dir)
            .map(|d| d.join(APP_DIR_NAME))
            .unwrap_or_else(|| PathBuf::from("./sfx"));

        let favorites_path = dirs::data_local_dir()
            .map(|d| d.join(APP_DIR_NAME).join("favorites.json"))
            .unwrap_or_else(|| PathBuf::from("./favorites.json"));

        Self {
            library_path,
            favorites_path,
            public_path: PathBuf::from("./public"),
            upload_temp_path: std::env::temp_dir().join("soundboard-uploads"),
            host: "127.0.0.1".to_string(),
            port: 3000,
            max_upload_bytes: 50 * 1024 * 1024,
            ffmpeg_path: "ffmpeg".to_string(),
            transcode_timeout_secs: 120,
        }
    }
}

/// Where the effective configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Loaded from this file
    File(PathBuf),
    /// Compiled defaults; `attempted` is the file that was found but could not be used
    Defaults { attempted: Option<PathBuf> },
}

/// Effective server configuration
#[derive(Debug, Clone)]
pub struct SoundboardConfig {
    /// Directory holding the `.mp3` library
    pub library_path: PathBuf,
    /// JSON document mapping filename to favorite flag
    pub favorites_path: PathBuf,
    /// Static UI assets
    pub public_path: PathBuf,
    /// Where raw uploads are spooled before processing
    pub upload_temp_path: PathBuf,
    pub host: String,
    pub port: u16,
    /// Upload size ceiling in bytes
    pub max_upload_bytes: u64,
    /// Encoder executable name or path
    pub ffmpeg_path: String,
    /// Upper bound on a single encoder run
    pub transcode_timeout: Duration,
    pub source: ConfigSource,
}

impl SoundboardConfig {
    /// Build the effective config from file contents layered over defaults
    pub fn from_file(file: ConfigFile, defaults: CompiledDefaults, source: ConfigSource) -> Self {
        Self {
            library_path: file
                .library_path
                .as_deref()
                .map(expand_tilde)
                .unwrap_or(defaults.library_path),
            favorites_path: file
                .favorites_path
                .as_deref()
                .map(expand_tilde)
                .unwrap_or(defaults.favorites_path),
            public_path: file
                .public_path
                .as_deref()
                .map(expand_tilde)
                .unwrap_or(defaults.public_path),
            upload_temp_path: file
                .upload_temp_path
                .as_deref()
                .map(expand_tilde)
                .unwrap_or(defaults.upload_temp_path),
            host: file.host.unwrap_or(defaults.host),
            port: file.port.unwrap_or(defaults.port),
            max_upload_bytes: file.max_upload_bytes.unwrap_or(defaults.max_upload_bytes),
            ffmpeg_path: file.ffmpeg_path.unwrap_or(defaults.ffmpeg_path),
            transcode_timeout: Duration::from_secs(
                file.transcode_timeout_secs
                    .unwrap_or(defaults.transcode_timeout_secs),
            ),
            source,
        }
    }

    /// Compiled defaults only
    pub fn defaults() -> Self {
        Self::from_file(
            ConfigFile::default(),
            CompiledDefaults::for_current_platform(),
            ConfigSource::Defaults { attempted: None },
        )
    }

    /// Path of the config file in effect (or the one that failed to load), for diagnostics
    pub fn config_path(&self) -> Option<&Path> {
        match &self.source {
            ConfigSource::File(path) => Some(path),
            ConfigSource::Defaults { attempted } => attempted.as_deref(),
        }
    }

    /// `host:port` bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Resolves and loads the config file following the lookup order
pub struct ConfigResolver {
    explicit_path: Option<PathBuf>,
}

impl ConfigResolver {
    /// `explicit_path` is the command-line `--config` value, if any
    pub fn new(explicit_path: Option<PathBuf>) -> Self {
        Self { explicit_path }
    }

    /// Candidate config file locations in priority order
    pub fn candidate_paths(&self) -> Vec<PathBuf> {
        let mut candidates = Vec::new();

        if let Some(path) = &self.explicit_path {
            candidates.push(path.clone());
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.trim().is_empty() {
                candidates.push(expand_tilde(&path));
            }
        }

        if let Some(dir) = dirs::config_dir() {
            candidates.push(dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME));
        }

        candidates.push(PathBuf::from(CONFIG_FILE_NAME));
        candidates
    }

    /// Resolve the effective configuration
    ///
    /// Never fails: an unreadable or invalid file produces a warning and defaults.
    pub fn resolve(&self) -> SoundboardConfig {
        let defaults = CompiledDefaults::for_current_platform();

        let found = self.candidate_paths().into_iter().find(|p| p.is_file());

        let mut config = match found {
            Some(path) => match load_config_file(&path) {
                Ok(file) => {
                    info!(path = %path.display(), "Loaded configuration file");
                    SoundboardConfig::from_file(file, defaults, ConfigSource::File(path))
                }
                Err(e) => {
                    warn!(error = %e, "Using compiled default configuration");
                    SoundboardConfig::from_file(
                        ConfigFile::default(),
                        defaults,
                        ConfigSource::Defaults {
                            attempted: Some(path),
                        },
                    )
                }
            },
            None => {
                if let Some(path) = &self.explicit_path {
                    warn!(path = %path.display(), "Config file not found");
                }
                info!("No configuration file found, using compiled defaults");
                SoundboardConfig::from_file(
                    ConfigFile::default(),
                    defaults,
                    ConfigSource::Defaults { attempted: None },
                )
            }
        };

        if let Ok(library) = std::env::var(LIBRARY_ENV_VAR) {
            if !library.trim().is_empty() {
                config.library_path = expand_tilde(&library);
            }
        }

        config
    }
}

/// Read and parse a config file
pub fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&content).map_err(|source| Error::ConfigParse {
        path: path.to_path_buf(),
        source,
    })
}

/// Expand a leading `~` to the user's home directory
///
/// `~user` forms are not supported and are returned unchanged.
pub fn expand_tilde(raw: &str) -> PathBuf {
    let trimmed = raw.trim();

    if trimmed == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = trimmed
        .strip_prefix("~/")
        .or_else(|| trimmed.strip_prefix("~\\"))
    {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }

    PathBuf::from(trimmed)
}
