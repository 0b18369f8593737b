#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

//! File system watching for the development loop
//!
//! This crate turns raw file system notifications into a slow stream of
//! consolidated triggers:
//! - Glob-based ignore patterns for build, cache and output directories
//! - An await-write-finish filter so triggers never fire mid-write
//! - Trailing-edge debouncing into one trigger per quiet period
//! - Best-effort watching: unwatchable roots are logged and skipped
//!
//! # Example
//!
//! ```no_run
//! use devloop_watcher::{FileWatcher, WatcherConfig};
//! use std::path::PathBuf;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = WatcherConfig::default();
//! let mut watcher = FileWatcher::new(config)?;
//!
//! let mut triggers = watcher.watch(&[PathBuf::from("notes")]).await?;
//!
//! while let Some(trigger) = triggers.recv().await {
//!     println!("{} change(s) settled", trigger.coalesced);
//! }
//! # Ok(())
//! # }
//! ```

// Private implementation modules
mod config;
mod debouncer;
mod events;
mod ignore;
mod stability;
mod watcher;

// Public exports - minimal API surface
pub use config::{WatcherConfig, WatcherConfigBuilder};
pub use debouncer::TrailingDebouncer;
pub use events::Trigger;
pub use ignore::IgnoreFilter;
pub use stability::{probe_file, FileStamp, WriteStabilizer};
pub use watcher::FileWatcher;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::WatcherConfig;
    pub use crate::events::Trigger;
    pub use crate::watcher::FileWatcher;
}
