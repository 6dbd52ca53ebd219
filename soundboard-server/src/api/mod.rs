//! HTTP API handlers
//!
//! Handlers translate requests into `SoundLibrary` calls and map every failure to an
//! `ApiError` JSON body.

pub mod health;
pub mod sounds;
pub mod upload;

pub use health::health_routes;
pub use sounds::sound_routes;
pub use upload::upload_routes;
