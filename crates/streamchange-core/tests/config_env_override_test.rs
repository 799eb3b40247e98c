//! Kept in its own test binary: it mutates process environment variables,
//! which every other `Settings` load in the same process would observe.
use std::env;
use std::fs;
use streamchange_core::Settings;
use tempfile::TempDir;

#[test]
fn test_env_variables_override_config_dir_files() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("default.toml"),
        r#"
[cache]
default_max_size = 500

[logging]
level = "debug"
"#,
    )
    .unwrap();

    env::set_var("STREAMCHANGE_CONFIG_DIR", dir.path());
    env::set_var("STREAMCHANGE__CACHE__DEFAULT_MAX_SIZE", "7");

    let settings = Settings::load(Some("test".to_string()));

    env::remove_var("STREAMCHANGE__CACHE__DEFAULT_MAX_SIZE");
    env::remove_var("STREAMCHANGE_CONFIG_DIR");

    let settings = settings.unwrap();
    assert_eq!(settings.env, "test");
    assert_eq!(settings.cache.default_max_size, 7);
    assert_eq!(settings.max_size_for("rooms"), 7);
    // values the environment does not mention still come from the file
    assert_eq!(settings.logging.level, "debug");
}
