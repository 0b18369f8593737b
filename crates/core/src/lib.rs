//! Core types for the devloop development-loop coordinator
//!
//! This crate provides the foundational pieces shared by the watcher,
//! the coordinator and the command-line binary:
//!
//! - **Configuration**: layered loading of `devloop.toml` and `DEVLOOP_*` overrides
//! - **Error handling**: the unified error taxonomy
//!

pub mod config;
pub mod error;

// Re-export main types for convenience
pub use config::{Config, ServerConfig, SyncConfig, WatchConfig};
pub use error::{Error, Result, ResultExt};

/// Version of the core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Result, ResultExt};
}
