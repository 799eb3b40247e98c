use std::fs;
use streamchange_core::{Settings, StreamChangeError};
use tempfile::TempDir;

#[test]
fn test_missing_files_fall_back_to_defaults() {
    let dir = TempDir::new().unwrap();
    let settings = Settings::load_from_sources(dir.path(), "test").unwrap();
    assert_eq!(settings.env, "test");
    assert_eq!(settings.cache.default_max_size, 10_000);
    assert!(settings.cache.caches.is_empty());
}

#[test]
fn test_environment_file_overrides_default_file() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("default.toml"),
        r#"
[cache]
default_max_size = 500

[[cache.caches]]
name = "rooms"
max_size = 3

[logging]
level = "debug"
"#,
    )
    .unwrap();
    fs::write(
        dir.path().join("production.toml"),
        r#"
[cache]
default_max_size = 2000
"#,
    )
    .unwrap();

    let settings = Settings::load_from_sources(dir.path(), "production").unwrap();
    assert_eq!(settings.cache.default_max_size, 2000);
    assert_eq!(settings.max_size_for("rooms"), 3);
    assert_eq!(settings.max_size_for("users"), 2000);
    assert_eq!(settings.logging.level, "debug");
    assert!(!settings.logging.json);
}

#[test]
fn test_invalid_file_is_rejected() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("default.toml"),
        r#"
[cache]
default_max_size = 0
"#,
    )
    .unwrap();

    let err = Settings::load_from_sources(dir.path(), "test").unwrap_err();
    assert!(matches!(err, StreamChangeError::Config(_)));
    assert!(err.to_string().contains("default_max_size"));
}

#[test]
fn test_settings_schema_names_cache_section() {
    let schema = schemars::schema_for!(Settings);
    let json = serde_json::to_string(&schema).unwrap();
    assert!(json.contains("default_max_size"));
}
