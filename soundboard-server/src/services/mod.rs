//! Library services
//!
//! Leaf to root: `library_fs` and `favorites` own the two stores, `encoder` and
//! `upload` turn uploads into library entries, `library` coordinates them.

pub mod audio_format;
pub mod encoder;
pub mod favorites;
pub mod library;
pub mod library_fs;
pub mod naming;
pub mod upload;

pub use encoder::{AudioEncoder, FfmpegEncoder};
pub use library::{LibraryInfo, LibraryPaths, SoundLibrary, SoundListing};
