//! Configuration loading from files and environment variables

use crate::error::{Error, Result};
use config::{Config as ConfigLib, Environment, File, FileFormat};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::Config;

/// File name looked up in the current directory when no `--config` is given
pub const CONFIG_FILE_NAME: &str = "devloop.toml";

/// Prefix of environment variable overrides
pub const ENV_PREFIX: &str = "DEVLOOP";

/// Keys whose environment values are comma-separated lists
const LIST_KEYS: &[&str] = &[
    "watch.paths",
    "watch.ignore_patterns",
    "sync.args",
    "server.args",
];

impl Config {
    /// Loads configuration from a TOML file with environment variable overrides
    ///
    /// The file is optional; a missing file yields the built-in defaults.
    /// Environment variables are prefixed with `DEVLOOP_` and use double underscores
    /// for nested values. For example:
    /// - `DEVLOOP_SERVER__PROGRAM=vite`
    /// - `DEVLOOP_WATCH__PATHS=docs,notes`
    pub fn from_file(path: &Path) -> Result<Self> {
        let mut builder = ConfigLib::builder();

        if path.exists() {
            debug!("Loading configuration from {}", path.display());
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }

        let mut environment = Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true)
            .list_separator(",");
        for key in LIST_KEYS {
            environment = environment.with_list_parse_key(key);
        }
        builder = builder.add_source(environment);

        let config = builder
            .build()
            .map_err(|e| Error::config(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| Error::config(format!("Failed to deserialize config: {e}")))
    }

    /// Creates a config from a TOML string (useful for testing)
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::config(format!("Failed to parse TOML: {e}")))
    }

    /// Load, resolve and validate the configuration
    ///
    /// Precedence (lowest to highest):
    /// 1. Hardcoded defaults
    /// 2. Config file (`./devloop.toml` or custom `--config` path)
    /// 3. Environment variables (`DEVLOOP_*`)
    ///
    /// Relative paths are resolved against the directory holding the config file.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let cwd = std::env::current_dir()
            .map_err(|e| Error::config(format!("Failed to get current dir: {e}")))?;

        let path = match config_path {
            Some(p) => {
                if !p.exists() {
                    return Err(Error::config(format!(
                        "Config file not found: {}",
                        p.display()
                    )));
                }
                p.to_path_buf()
            }
            None => cwd.join(CONFIG_FILE_NAME),
        };

        let mut config = Self::from_file(&path)?;
        config.resolve_paths(&base_dir(&path, &cwd));
        config.validate()?;
        Ok(config)
    }
}

fn base_dir(config_path: &Path, cwd: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if parent.is_absolute() => parent.to_path_buf(),
        Some(parent) => cwd.join(parent),
        None => cwd.to_path_buf(),
    }
}
