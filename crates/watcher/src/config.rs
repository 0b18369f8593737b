//! Configuration types for the file watcher
//!
//! This module provides the immutable configuration structure controlling
//! debouncing, the write-stability filter and ignore patterns.

use devloop_core::WatchConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Immutable configuration for the file watcher
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Quiet window in milliseconds before a trigger fires (default: 200ms)
    pub debounce_ms: u64,
    /// Time a file must stay unchanged before it counts as written (default: 200ms)
    pub stability_threshold_ms: u64,
    /// Poll granularity of the stability check (default: 50ms)
    pub poll_interval_ms: u64,
    /// Patterns to ignore (glob patterns)
    pub ignore_patterns: Vec<String>,
    /// Maximum number of raw events buffered between notify and the pipeline
    pub max_queue_size: usize,
    /// Maximum number of triggers buffered for the consumer
    pub trigger_buffer: usize,
}

impl WatcherConfig {
    /// Create configuration from builder
    pub fn builder() -> WatcherConfigBuilder {
        WatcherConfigBuilder::default()
    }

    /// Get the debounce duration
    pub fn debounce_duration(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Get the stability threshold
    pub fn stability_threshold(&self) -> Duration {
        Duration::from_millis(self.stability_threshold_ms)
    }

    /// Get the stability poll interval
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 200,
            stability_threshold_ms: 200,
            poll_interval_ms: 50,
            ignore_patterns: Vec::new(),
            max_queue_size: 10_000,
            trigger_buffer: 16,
        }
    }
}

impl From<&WatchConfig> for WatcherConfig {
    fn from(watch: &WatchConfig) -> Self {
        Self::builder()
            .debounce_ms(watch.debounce_ms)
            .stability_threshold_ms(watch.stability_threshold_ms)
            .poll_interval_ms(watch.poll_interval_ms)
            .ignore_patterns(watch.ignore_patterns.clone())
            .build()
    }
}

/// Builder for WatcherConfig
#[derive(Debug, Default)]
pub struct WatcherConfigBuilder {
    config: WatcherConfig,
}

impl WatcherConfigBuilder {
    /// Set debounce window in milliseconds
    pub fn debounce_ms(mut self, ms: u64) -> Self {
        self.config.debounce_ms = ms;
        self
    }

    /// Set write-stability threshold in milliseconds
    pub fn stability_threshold_ms(mut self, ms: u64) -> Self {
        self.config.stability_threshold_ms = ms;
        self
    }

    /// Set stability poll interval in milliseconds
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    /// Set ignore patterns
    pub fn ignore_patterns(mut self, patterns: Vec<String>) -> Self {
        self.config.ignore_patterns = patterns;
        self
    }

    /// Add an ignore pattern
    pub fn add_ignore_pattern(mut self, pattern: String) -> Self {
        self.config.ignore_patterns.push(pattern);
        self
    }

    /// Build the configuration
    pub fn build(self) -> WatcherConfig {
        self.config
    }
}
