//! Tests for configuration module

use super::*;
use crate::error::{Error, Result};
use pretty_assertions::assert_eq;
use std::io::Write;
use tempfile::NamedTempFile;

fn create_temp_config_file(content: &str) -> Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .map_err(|e| Error::config(format!("Failed to create temp file: {e}")))?;
    file.write_all(content.as_bytes())
        .map_err(|e| Error::config(format!("Failed to write temp file: {e}")))?;
    file.flush()
        .map_err(|e| Error::config(format!("Failed to flush temp file: {e}")))?;
    Ok(file)
}

fn with_env_var<F, T>(key: &str, value: &str, f: F) -> T
where
    F: FnOnce() -> T,
{
    std::env::set_var(key, value);
    let result = f();
    std::env::remove_var(key);
    result
}

#[test]
fn test_defaults_match_dev_script() {
    let config = Config::default();

    assert_eq!(
        config.watch.paths,
        vec![
            PathBuf::from("notes"),
            PathBuf::from("repros"),
            PathBuf::from("backlog/docs"),
        ]
    );
    assert_eq!(config.watch.debounce(), Duration::from_millis(200));
    assert_eq!(config.watch.stability_threshold(), Duration::from_millis(200));
    assert_eq!(config.watch.poll_interval(), Duration::from_millis(50));
    assert_eq!(config.sync.command_line(), "npm run sync");
    assert_eq!(config.server.command_line(), "astro dev");
    assert_eq!(config.server.stop_timeout(), Some(Duration::from_secs(5)));
    assert!(config
        .watch
        .ignore_patterns
        .contains(&"**/.git/**".to_string()));
    assert!(config.validate().is_ok());
}

#[test]
fn test_from_toml_str_valid() {
    let toml = r#"
        [watch]
        paths = ["docs"]
        debounce_ms = 300

        [sync]
        program = "python3"
        args = ["tools/sync.py", "--clean"]
        output_dir = "public/generated"

        [server]
        program = "vite"
        args = []
    "#;

    let config = Config::from_toml_str(toml).expect("Failed to parse valid TOML");
    assert_eq!(config.watch.paths, vec![PathBuf::from("docs")]);
    assert_eq!(config.watch.debounce_ms, 300);
    assert_eq!(config.watch.poll_interval_ms, 50);
    assert_eq!(config.sync.command_line(), "python3 tools/sync.py --clean");
    assert_eq!(config.sync.working_dir, PathBuf::from("site"));
    assert_eq!(config.server.command_line(), "vite");
    assert_eq!(config.server.stop_timeout_ms, Some(5000));
}

#[test]
fn test_from_toml_str_empty_uses_defaults() {
    let config = Config::from_toml_str("").expect("Failed to parse empty TOML");
    assert_eq!(config, Config::default());
}

#[test]
fn test_from_toml_str_invalid() {
    let result = Config::from_toml_str("[watch\npaths = 3");
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_validate_rejects_empty_watch_set() {
    let mut config = Config::default();
    config.watch.paths.clear();

    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("watch.paths"));
}

#[test]
fn test_validate_rejects_bad_glob() {
    let mut config = Config::default();
    config.watch.ignore_patterns.push("[unclosed".to_string());

    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("Invalid ignore pattern"));
}

#[test]
fn test_validate_rejects_zero_timers() {
    let mut config = Config::default();
    config.watch.poll_interval_ms = 0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.watch.debounce_ms = 0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.server.stop_timeout_ms = Some(0);
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.server.stop_timeout_ms = None;
    assert!(config.validate().is_ok());
}

#[test]
fn test_validate_rejects_blank_programs() {
    let mut config = Config::default();
    config.sync.program = "  ".to_string();
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.server.program = String::new();
    assert!(config.validate().is_err());
}

#[test]
fn test_resolve_paths() {
    let mut config = Config::default();
    config.watch.paths.push(PathBuf::from("/abs/notes"));
    config.resolve_paths(Path::new("/repo"));

    assert_eq!(config.watch.paths[0], PathBuf::from("/repo/notes"));
    assert_eq!(config.watch.paths[3], PathBuf::from("/abs/notes"));
    assert_eq!(config.sync.working_dir, PathBuf::from("/repo/site"));
    assert_eq!(
        config.sync.output_dir,
        PathBuf::from("/repo/site/src/content/docs")
    );
    assert_eq!(config.server.working_dir, PathBuf::from("/repo/site"));
}

#[test]
fn test_from_file_reads_toml() -> Result<()> {
    let file = create_temp_config_file(
        r#"
        [watch]
        paths = ["content"]
        ignore_patterns = ["**/drafts/**"]

        [sync]
        program = "make"
        args = ["sync"]
    "#,
    )?;

    let config = Config::from_file(file.path())?;
    assert_eq!(config.watch.paths, vec![PathBuf::from("content")]);
    assert_eq!(config.watch.ignore_patterns, vec!["**/drafts/**".to_string()]);
    assert_eq!(config.sync.command_line(), "make sync");
    assert_eq!(config.watch.stability_threshold_ms, 200);
    Ok(())
}

#[test]
fn test_from_file_missing_file_uses_defaults() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let config = Config::from_file(&dir.path().join("absent.toml"))?;
    assert_eq!(config.watch, WatchConfig::default());
    assert_eq!(config.sync, SyncConfig::default());
    Ok(())
}

#[test]
fn test_env_override() -> Result<()> {
    let file = create_temp_config_file(
        r#"
        [server]
        stop_timeout_ms = 1000
    "#,
    )?;

    let config = with_env_var("DEVLOOP_SERVER__STOP_TIMEOUT_MS", "2500", || {
        Config::from_file(file.path())
    })?;
    assert_eq!(config.server.stop_timeout_ms, Some(2500));
    Ok(())
}

#[test]
fn test_load_resolves_against_config_dir() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join(CONFIG_FILE_NAME);
    std::fs::write(
        &path,
        r#"
        [watch]
        paths = ["notes"]
    "#,
    )?;

    let config = Config::load(Some(&path))?;
    assert_eq!(config.watch.paths, vec![dir.path().join("notes")]);
    assert_eq!(config.server.working_dir, dir.path().join("site"));
    Ok(())
}

#[test]
fn test_load_missing_explicit_file_is_error() {
    let result = Config::load(Some(Path::new("/definitely/not/here/devloop.toml")));
    assert!(matches!(result, Err(Error::Config(msg)) if msg.contains("not found")));
}

#[test]
fn test_to_toml_string_round_trips() -> Result<()> {
    let config = Config::default();
    let rendered = config.to_toml_string()?;
    assert!(rendered.contains("[server]"));
    assert_eq!(Config::from_toml_str(&rendered)?, config);
    Ok(())
}
