//! Default values and functions for configuration

use std::path::PathBuf;

// Default constants
pub(crate) const DEFAULT_SYNC_PROGRAM: &str = "npm";
pub(crate) const DEFAULT_SERVER_PROGRAM: &str = "astro";
pub(crate) const DEFAULT_SITE_DIR: &str = "site";
pub(crate) const DEFAULT_OUTPUT_DIR: &str = "site/src/content/docs";

pub(crate) fn default_watch_paths() -> Vec<PathBuf> {
    vec![
        PathBuf::from("notes"),
        PathBuf::from("repros"),
        PathBuf::from("backlog/docs"),
    ]
}

pub(crate) fn default_ignore_patterns() -> Vec<String> {
    vec![
        "**/.git/**".to_string(),
        "**/.cache/**".to_string(),
        "**/.local/**".to_string(),
        "**/.venv/**".to_string(),
        "**/build-occt/**".to_string(),
        "**/occt/**".to_string(),
    ]
}

pub(crate) fn default_debounce_ms() -> u64 {
    200
}

pub(crate) fn default_stability_threshold_ms() -> u64 {
    200
}

pub(crate) fn default_poll_interval_ms() -> u64 {
    50
}

pub(crate) fn default_sync_program() -> String {
    DEFAULT_SYNC_PROGRAM.to_string()
}

pub(crate) fn default_sync_args() -> Vec<String> {
    vec!["run".to_string(), "sync".to_string()]
}

pub(crate) fn default_site_dir() -> PathBuf {
    PathBuf::from(DEFAULT_SITE_DIR)
}

pub(crate) fn default_output_dir() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_DIR)
}

pub(crate) fn default_server_program() -> String {
    DEFAULT_SERVER_PROGRAM.to_string()
}

pub(crate) fn default_server_args() -> Vec<String> {
    vec!["dev".to_string()]
}

pub(crate) fn default_stop_timeout_ms() -> Option<u64> {
    Some(5000)
}
