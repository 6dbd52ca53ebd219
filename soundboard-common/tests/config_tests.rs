//! Integration tests for configuration resolution and graceful degradation
//!
//! Tests cover:
//! - Missing config file falls back to compiled defaults
//! - Invalid config file falls back to defaults but remembers the attempted path
//! - Explicit path beats the environment variable
//! - `~` expansion for configured paths
//! - Library directory environment override
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate SOUNDBOARD_CONFIG or SOUNDBOARD_LIBRARY are marked with
//! #[serial] to ensure they run sequentially, not in parallel.

use serial_test::serial;
use soundboard_common::config::{
    load_config_file, CompiledDefaults, ConfigResolver, ConfigSource, CONFIG_ENV_VAR,
    LIBRARY_ENV_VAR,
};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

fn clear_env() {
    env::remove_var(CONFIG_ENV_VAR);
    env::remove_var(LIBRARY_ENV_VAR);
}

fn write_config(dir: &tempfile::TempDir, name: &str, body: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, body).expect("Failed to write config");
    path
}

#[test]
#[serial]
fn test_explicit_config_file_is_loaded() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        "config.json",
        r#"{
            "libraryPath": "/srv/sfx",
            "favoritesPath": "/srv/favorites.json",
            "port": 4100,
            "maxUploadBytes": 1024,
            "transcodeTimeoutSecs": 5
        }"#,
    );

    let config = ConfigResolver::new(Some(path.clone())).resolve();

    assert_eq!(config.source, ConfigSource::File(path));
    assert_eq!(config.library_path, PathBuf::from("/srv/sfx"));
    assert_eq!(config.favorites_path, PathBuf::from("/srv/favorites.json"));
    assert_eq!(config.port, 4100);
    assert_eq!(config.max_upload_bytes, 1024);
    assert_eq!(config.transcode_timeout, Duration::from_secs(5));
}

#[test]
#[serial]
fn test_invalid_config_falls_back_to_defaults() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "config.json", "{ not json");

    let config = ConfigResolver::new(Some(path.clone())).resolve();
    let defaults = CompiledDefaults::for_current_platform();

    assert_eq!(
        config.source,
        ConfigSource::Defaults {
            attempted: Some(path.clone())
        }
    );
    assert_eq!(config.config_path(), Some(path.as_path()));
    assert_eq!(config.library_path, defaults.library_path);
    assert_eq!(config.port, defaults.port);
}

#[test]
#[serial]
fn test_wrong_field_type_is_a_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "config.json", r#"{"port": "not a number"}"#);

    let result = load_config_file(&path);
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("Invalid config file"));
}

#[test]
#[serial]
fn test_env_var_config_file() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "from-env.json", r#"{"port": 4200}"#);
    env::set_var(CONFIG_ENV_VAR, &path);

    let config = ConfigResolver::new(None).resolve();

    assert_eq!(config.port, 4200);
    assert_eq!(config.source, ConfigSource::File(path));

    clear_env();
}

#[test]
#[serial]
fn test_explicit_path_takes_precedence_over_env() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let explicit = write_config(&dir, "explicit.json", r#"{"port": 4300}"#);
    let from_env = write_config(&dir, "env.json", r#"{"port": 4400}"#);
    env::set_var(CONFIG_ENV_VAR, &from_env);

    let config = ConfigResolver::new(Some(explicit)).resolve();
    assert_eq!(config.port, 4300);

    clear_env();
}

#[test]
#[serial]
fn test_missing_explicit_file_does_not_error() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.json");

    let resolver = ConfigResolver::new(Some(missing.clone()));
    assert_eq!(resolver.candidate_paths()[0], missing);

    // Should not panic
    let config = resolver.resolve();
    assert!(!config.library_path.as_os_str().is_empty());
}

#[test]
#[serial]
fn test_tilde_paths_expand_to_home() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        "config.json",
        r#"{"libraryPath": "~/sfx", "favoritesPath": "~/.soundboard/favorites.json"}"#,
    );

    let config = ConfigResolver::new(Some(path)).resolve();
    let home = dirs::home_dir().expect("home directory");

    assert_eq!(config.library_path, home.join("sfx"));
    assert_eq!(
        config.favorites_path,
        home.join(".soundboard").join("favorites.json")
    );
}

#[test]
#[serial]
fn test_library_env_override_beats_file() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "config.json", r#"{"libraryPath": "/srv/sfx"}"#);
    env::set_var(LIBRARY_ENV_VAR, "/mnt/other-sfx");

    let config = ConfigResolver::new(Some(path)).resolve();
    assert_eq!(config.library_path, PathBuf::from("/mnt/other-sfx"));

    clear_env();
}

#[test]
fn test_compiled_defaults_are_sane() {
    let defaults = CompiledDefaults::for_current_platform();

    assert!(!defaults.library_path.as_os_str().is_empty());
    assert!(defaults.favorites_path.ends_with("favorites.json"));
    assert_eq!(defaults.host, "127.0.0.1");
    assert_eq!(defaults.port, 3000);
    assert_eq!(defaults.max_upload_bytes, 50 * 1024 * 1024);
    assert_eq!(defaults.ffmpeg_path, "ffmpeg");
}
