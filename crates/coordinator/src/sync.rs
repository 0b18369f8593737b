//! Serialized execution of the external synchronization step
//!
//! `SyncGate` is the whole mutual-exclusion story: a `running` flag and a
//! `queued` flag. Requests while a run is active collapse into exactly one
//! follow-up run.

use async_trait::async_trait;
use devloop_core::{
    error::{Error, Result},
    SyncConfig,
};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// What `SyncGate::request` decided
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAdmission {
    /// No run was active; the caller must start one now
    Start,
    /// A run is active; one follow-up run is owed when it finishes
    Queued,
}

/// Running/queued flags guarding the sync step
#[derive(Debug, Default)]
pub struct SyncGate {
    running: bool,
    queued: bool,
}

impl SyncGate {
    /// Create an idle gate
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask for a sync run
    pub fn request(&mut self) -> SyncAdmission {
        if self.running {
            self.queued = true;
            SyncAdmission::Queued
        } else {
            self.running = true;
            SyncAdmission::Start
        }
    }

    /// Record that the active run finished
    ///
    /// Returns `true` when a request arrived during the run; the gate then
    /// stays running and the caller must start exactly one more run.
    pub fn finish(&mut self) -> bool {
        if self.queued {
            self.queued = false;
            true
        } else {
            self.running = false;
            false
        }
    }

    /// Whether a run is in flight
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Whether a follow-up run is owed
    pub fn is_queued(&self) -> bool {
        self.queued
    }
}

/// Outcome of a sync run that could be launched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Exit status zero
    Succeeded,
    /// Nonzero exit status, or terminated by a signal (`code` is `None` then)
    Failed { code: Option<i32> },
}

impl SyncOutcome {
    /// Whether the run succeeded
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

/// The synchronization step run on every trigger
#[async_trait]
pub trait SyncStep: Send + Sync {
    /// Run the step to completion
    ///
    /// Returns `Err` only when the step could not be launched at all.
    async fn run(&self) -> Result<SyncOutcome>;

    /// Human-readable description for the progress stream
    fn describe(&self) -> String;
}

/// Sync step backed by an external command
#[derive(Debug, Clone)]
pub struct CommandSync {
    config: SyncConfig,
}

impl CommandSync {
    /// Create a command step from configuration
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }
}

#[async_trait]
impl SyncStep for CommandSync {
    async fn run(&self) -> Result<SyncOutcome> {
        debug!(
            "Spawning `{}` in {}",
            self.describe(),
            self.config.working_dir.display()
        );
        let status = Command::new(&self.config.program)
            .args(&self.config.args)
            .current_dir(&self.config.working_dir)
            .stdin(Stdio::null())
            .status()
            .await
            .map_err(|e| Error::spawn(self.describe(), e))?;

        if status.success() {
            Ok(SyncOutcome::Succeeded)
        } else {
            Ok(SyncOutcome::Failed {
                code: status.code(),
            })
        }
    }

    fn describe(&self) -> String {
        self.config.command_line()
    }
}
