//! Configuration loading tests

use crate::util::config::{load_config, load_config_file, save_config, ConfigError, EngineConfig};
use crate::util::logger::LogLevel;
use std::fs;

#[test]
fn test_defaults() {
    let config = EngineConfig::default();
    assert_eq!(config.engine.max_depth, 1024);
    assert_eq!(config.engine.unknown_location, "UNKNOWN_LOCATION");
    assert!(config.engine.warn_unreleased);
    assert_eq!(config.logging.level, LogLevel::Info);
    assert!(config.logging.filter.is_none());
}

#[test]
fn test_partial_file_keeps_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "[engine]\nmax_depth = 8\n\n[logging]\nlevel = \"debug\"\n").unwrap();

    let config = load_config(Some(&path)).unwrap();
    assert_eq!(config.engine.max_depth, 8);
    assert_eq!(config.engine.unknown_location, "UNKNOWN_LOCATION");
    assert_eq!(config.logging.level, LogLevel::Debug);
}

#[test]
fn test_missing_file_is_default() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_config_file(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(config, EngineConfig::default());
}

#[test]
fn test_malformed_file_is_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "[engine]\nmax_depth = \"deep\"\n").unwrap();

    let err = load_config_file(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
    assert!(err.to_string().contains("config.toml"));
}

#[test]
fn test_save_then_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");
    let mut config = EngineConfig::default();
    config.engine.warn_unreleased = false;
    config.logging.filter = Some("catena=trace".to_string());

    save_config(&config, &path).unwrap();
    assert_eq!(load_config_file(&path).unwrap(), config);
}
