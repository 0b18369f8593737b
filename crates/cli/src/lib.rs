//! Library interface for the devloop CLI
//!
//! The subcommands that only print something live here so that integration
//! tests can call them without spawning the binary.

use anyhow::{Context, Result};
use devloop_coordinator::DirectorySnapshot;
use std::path::Path;

pub use devloop_core::config::Config;

/// Load, resolve and validate configuration
///
/// `path` is an explicit `--config` file; without it `./devloop.toml` is used
/// when present, otherwise built-in defaults.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    Config::load(path).context("Failed to load configuration")
}

/// The output of `devloop snapshot`: one relative path per line
pub fn render_snapshot(dir: &Path) -> Result<String> {
    let snapshot = DirectorySnapshot::capture(dir)
        .with_context(|| format!("Failed to snapshot {}", dir.display()))?;

    let mut out = String::new();
    for path in snapshot.paths() {
        out.push_str(path);
        out.push('\n');
    }
    Ok(out)
}

/// The output of `devloop config`: the effective configuration as TOML
pub fn render_config(config: &Config) -> Result<String> {
    Ok(config.to_toml_string()?)
}
