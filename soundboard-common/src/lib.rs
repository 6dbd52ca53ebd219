//! # Soundboard Common Library
//!
//! Shared code for the soundboard server and its tooling:
//! - Configuration loading and path resolution
//! - Common error type
//! - Human-readable byte size formatting

pub mod config;
pub mod error;
pub mod human_size;

pub use config::SoundboardConfig;
pub use error::{Error, Result};
pub use human_size::format_human_size;
