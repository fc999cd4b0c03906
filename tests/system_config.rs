//! Actor system configuration files

use tempfile::tempdir;
use torq::runtime::{ActorSystemConfig, RuntimeError};

#[test]
fn test_config_save_and_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("system.json");

    let config = ActorSystemConfig {
        name: "lab".to_string(),
        time_slice: 500,
        max_evaluation_time_ms: 1_000,
    };
    config.save(&path).unwrap();

    let loaded = ActorSystemConfig::load(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_partial_config_uses_defaults() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("system.json");
    std::fs::write(&path, r#"{"name": "partial"}"#).unwrap();

    let loaded = ActorSystemConfig::load(&path).unwrap();
    assert_eq!(loaded.name, "partial");
    assert_eq!(loaded.time_slice, ActorSystemConfig::default().time_slice);
    assert_eq!(loaded.max_evaluation_time_ms, 30_000);
}

#[test]
fn test_zero_time_slice_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("system.json");
    std::fs::write(&path, r#"{"time_slice": 0}"#).unwrap();

    let err = ActorSystemConfig::load(&path).unwrap_err();
    assert!(matches!(err, RuntimeError::Config(_)), "{err}");
}

#[test]
fn test_missing_and_malformed_files() {
    let dir = tempdir().unwrap();

    let err = ActorSystemConfig::load(&dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, RuntimeError::Io(_)));

    let path = dir.path().join("broken.json");
    std::fs::write(&path, "{ not json").unwrap();
    let err = ActorSystemConfig::load(&path).unwrap_err();
    assert!(matches!(err, RuntimeError::Json(_)));
}
