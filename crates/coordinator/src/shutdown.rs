//! Ordered teardown
//!
//! Every way out of the loop ends here: the watcher is closed first, then the
//! server is interrupted. Failures in either step are logged and swallowed so
//! that the exit code always reaches the caller.

use crate::supervisor::ProcessSupervisor;
use async_trait::async_trait;
use devloop_core::error::Result;
use devloop_watcher::FileWatcher;
use std::fmt;
use tracing::{info, warn};

/// Why the coordinator is shutting down
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    /// SIGINT or SIGTERM received by the coordinator
    Signal(&'static str),
    /// The server exited on its own outside a restart
    ServerExited { code: Option<i32> },
    /// An unrecoverable error after startup
    Fatal(String),
}

impl ShutdownReason {
    /// Process exit code for this reason
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Signal(_) => 0,
            Self::ServerExited { code } => code.unwrap_or(0),
            Self::Fatal(_) => 1,
        }
    }
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Signal(name) => write!(f, "received {name}"),
            Self::ServerExited { code: Some(code) } => write!(f, "server exited with code {code}"),
            Self::ServerExited { code: None } => f.write_str("server was killed by a signal"),
            Self::Fatal(msg) => write!(f, "fatal error: {msg}"),
        }
    }
}

/// Something that stops producing triggers when closed
#[async_trait]
pub trait WatchHandle: Send {
    async fn close(&mut self) -> Result<()>;
}

/// Something that can be asked to terminate
pub trait ServerHandle: Send {
    fn interrupt(&mut self) -> Result<()>;
}

#[async_trait]
impl WatchHandle for FileWatcher {
    async fn close(&mut self) -> Result<()> {
        self.stop().await
    }
}

impl ServerHandle for ProcessSupervisor {
    fn interrupt(&mut self) -> Result<()> {
        ProcessSupervisor::interrupt(self)
    }
}

/// Tear everything down and return the exit code for `reason`
pub async fn shutdown<W, S>(reason: ShutdownReason, watcher: Option<&mut W>, server: &mut S) -> i32
where
    W: WatchHandle + ?Sized,
    S: ServerHandle + ?Sized,
{
    info!("Shutting down: {}", reason);

    if let Some(watcher) = watcher {
        if let Err(e) = watcher.close().await {
            warn!("Failed to close watcher: {}", e);
        }
    }

    if let Err(e) = server.interrupt() {
        warn!("Failed to interrupt server: {}", e);
    }

    reason.exit_code()
}
