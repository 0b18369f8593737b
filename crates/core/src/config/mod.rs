//! Configuration module for devloop
//!
//! This module provides configuration structures and loading mechanisms for the
//! development-loop coordinator. Configuration can be loaded from a TOML file
//! and/or environment variables.

mod defaults;
mod loading;

#[cfg(test)]
mod tests;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub use loading::{CONFIG_FILE_NAME, ENV_PREFIX};

use defaults::*;

/// Main configuration structure for devloop
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Watch set configuration
    #[serde(default)]
    pub watch: WatchConfig,

    /// Synchronization step configuration
    #[serde(default)]
    pub sync: SyncConfig,

    /// Supervised development server configuration
    #[serde(default)]
    pub server: ServerConfig,
}

/// Configuration for the watch set and its timers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WatchConfig {
    /// Directories to watch recursively
    #[serde(default = "default_watch_paths")]
    pub paths: Vec<PathBuf>,

    /// Glob patterns excluded from triggering
    #[serde(default = "default_ignore_patterns")]
    pub ignore_patterns: Vec<String>,

    /// Quiet window before a trigger fires
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// How long a file must stay unchanged before it counts as written
    #[serde(default = "default_stability_threshold_ms")]
    pub stability_threshold_ms: u64,

    /// Polling granularity of the write-stability check
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

/// Configuration for the external synchronization command
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncConfig {
    /// Program to invoke
    #[serde(default = "default_sync_program")]
    pub program: String,

    /// Fixed arguments passed to the program
    #[serde(default = "default_sync_args")]
    pub args: Vec<String>,

    /// Working directory of the command
    #[serde(default = "default_site_dir")]
    pub working_dir: PathBuf,

    /// Directory tree produced by the command, enumerated after every successful run
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

/// Configuration for the supervised development server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// Program to invoke
    #[serde(default = "default_server_program")]
    pub program: String,

    /// Fixed arguments passed to the program
    #[serde(default = "default_server_args")]
    pub args: Vec<String>,

    /// Working directory of the server
    #[serde(default = "default_site_dir")]
    pub working_dir: PathBuf,

    /// Grace period after SIGINT before the server is force-killed.
    /// `None` waits for the server to exit on its own, however long it takes.
    #[serde(default = "default_stop_timeout_ms")]
    pub stop_timeout_ms: Option<u64>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            paths: default_watch_paths(),
            ignore_patterns: default_ignore_patterns(),
            debounce_ms: default_debounce_ms(),
            stability_threshold_ms: default_stability_threshold_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            program: default_sync_program(),
            args: default_sync_args(),
            working_dir: default_site_dir(),
            output_dir: default_output_dir(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            program: default_server_program(),
            args: default_server_args(),
            working_dir: default_site_dir(),
            stop_timeout_ms: default_stop_timeout_ms(),
        }
    }
}

impl WatchConfig {
    /// Get the debounce quiet window
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Get the write-stability threshold
    pub fn stability_threshold(&self) -> Duration {
        Duration::from_millis(self.stability_threshold_ms)
    }

    /// Get the write-stability poll interval
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl SyncConfig {
    /// Human-readable command line, used in logs and errors
    pub fn command_line(&self) -> String {
        command_line(&self.program, &self.args)
    }
}

impl ServerConfig {
    /// Human-readable command line, used in logs and errors
    pub fn command_line(&self) -> String {
        command_line(&self.program, &self.args)
    }

    /// Get the graceful stop timeout, if any
    pub fn stop_timeout(&self) -> Option<Duration> {
        self.stop_timeout_ms.map(Duration::from_millis)
    }
}

fn command_line(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}

impl Config {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.watch.paths.is_empty() {
            return Err(Error::config(
                "watch.paths must name at least one directory".to_string(),
            ));
        }

        for pattern in &self.watch.ignore_patterns {
            glob::Pattern::new(pattern).map_err(|e| {
                Error::config(format!("Invalid ignore pattern '{pattern}': {e}"))
            })?;
        }

        if self.watch.debounce_ms == 0 {
            return Err(Error::config(
                "watch.debounce_ms must be greater than 0".to_string(),
            ));
        }
        if self.watch.stability_threshold_ms == 0 {
            return Err(Error::config(
                "watch.stability_threshold_ms must be greater than 0".to_string(),
            ));
        }
        if self.watch.poll_interval_ms == 0 {
            return Err(Error::config(
                "watch.poll_interval_ms must be greater than 0".to_string(),
            ));
        }

        if self.sync.program.trim().is_empty() {
            return Err(Error::config("sync.program must not be empty".to_string()));
        }
        if self.server.program.trim().is_empty() {
            return Err(Error::config(
                "server.program must not be empty".to_string(),
            ));
        }

        if self.server.stop_timeout_ms == Some(0) {
            return Err(Error::config(
                "server.stop_timeout_ms must be greater than 0 when set".to_string(),
            ));
        }

        Ok(())
    }

    /// Resolve every relative path against `base`
    ///
    /// Paths in a config file are relative to the directory containing that file.
    pub fn resolve_paths(&mut self, base: &Path) {
        for path in &mut self.watch.paths {
            *path = resolve(base, path);
        }
        self.sync.working_dir = resolve(base, &self.sync.working_dir);
        self.sync.output_dir = resolve(base, &self.sync.output_dir);
        self.server.working_dir = resolve(base, &self.server.working_dir);
    }

    /// Serialize the effective configuration back to TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::config(format!("Failed to serialize config: {e}")))
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
