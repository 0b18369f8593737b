#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

//! Development-loop coordination
//!
//! Ties the file watcher to an external sync command and a long-running
//! development server:
//! - `SyncGate` serializes sync runs and collapses overlapping requests
//! - `SnapshotTracker` restarts the server only when the output tree's
//!   structure changes
//! - `ProcessSupervisor` owns the server process and never runs two at once
//! - `shutdown` tears everything down in a fixed order
//!
//! # Example
//!
//! ```no_run
//! use devloop_coordinator::Coordinator;
//! use devloop_core::config::Config;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load(None)?;
//! let code = Coordinator::new(config)?.run().await?;
//! std::process::exit(code);
//! # }
//! ```

mod coordinator;
mod shutdown;
mod snapshot;
mod supervisor;
mod sync;

pub use coordinator::Coordinator;
pub use shutdown::{shutdown, ServerHandle, ShutdownReason, WatchHandle};
pub use snapshot::{compare, DirectorySnapshot, SnapshotDiff, SnapshotTracker, SnapshotVerdict};
pub use supervisor::{ProcessSupervisor, ServerExit, ServerState};
pub use sync::{CommandSync, SyncAdmission, SyncGate, SyncOutcome, SyncStep};
