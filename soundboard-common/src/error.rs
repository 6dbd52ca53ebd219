//! Common error types for the soundboard

use std::path::PathBuf;
use thiserror::Error;

/// Common result type for soundboard operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors shared across soundboard crates
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file could not be read
    #[error("Cannot read config file {}: {source}", .path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file is not valid JSON or has wrong field types
    #[error("Invalid config file {}: {source}", .path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
