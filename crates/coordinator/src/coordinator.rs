//! The development-loop event loop
//!
//! `Coordinator` owns the watcher, the sync gate, the snapshot tracker and the
//! supervisor. Everything mutable lives here and is touched only from the one
//! `select!` loop; sync runs happen on spawned tasks and report back through a
//! channel.

use crate::{
    shutdown::{shutdown, ShutdownReason},
    snapshot::{DirectorySnapshot, SnapshotTracker, SnapshotVerdict},
    supervisor::{ProcessSupervisor, ServerExit},
    sync::{CommandSync, SyncAdmission, SyncGate, SyncOutcome, SyncStep},
};
use devloop_core::{
    error::{Error, Result},
    Config,
};
use devloop_watcher::{FileWatcher, WatcherConfig};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

const REPORT_CHANNEL_CAPACITY: usize = 4;

/// What a finished sync task hands back to the loop
#[derive(Debug)]
enum SyncReport {
    /// The command could not be launched
    SpawnFailed(Error),
    /// The command ran and failed
    Failed { code: Option<i32> },
    /// The command succeeded; carries the enumerated output tree
    Succeeded(Result<DirectorySnapshot>),
}

/// Single owner of the development loop
pub struct Coordinator {
    config: Config,
    sync: Arc<dyn SyncStep>,
    gate: SyncGate,
    tracker: SnapshotTracker,
    supervisor: ProcessSupervisor,
    server_exits: mpsc::Receiver<ServerExit>,
    watcher: FileWatcher,
    reports_tx: mpsc::Sender<SyncReport>,
    reports_rx: mpsc::Receiver<SyncReport>,
}

impl Coordinator {
    /// Build a coordinator from validated configuration
    pub fn new(config: Config) -> Result<Self> {
        let watcher = FileWatcher::new(WatcherConfig::from(&config.watch))?;
        let (supervisor, server_exits) = ProcessSupervisor::new(&config.server);
        let sync: Arc<dyn SyncStep> = Arc::new(CommandSync::from_config(&config.sync));
        let (reports_tx, reports_rx) = mpsc::channel(REPORT_CHANNEL_CAPACITY);

        Ok(Self {
            config,
            sync,
            gate: SyncGate::new(),
            tracker: SnapshotTracker::new(),
            supervisor,
            server_exits,
            watcher,
            reports_tx,
            reports_rx,
        })
    }

    /// Replace the sync command with another step
    pub fn with_sync_step(mut self, step: Arc<dyn SyncStep>) -> Self {
        self.sync = step;
        self
    }

    /// Run until SIGINT/SIGTERM or until the server exits on its own
    ///
    /// Returns the process exit code. Startup failures are returned as errors.
    pub async fn run(self) -> Result<i32> {
        let signals = TerminationSignals::register()?;
        self.run_until(signals.recv()).await
    }

    /// Run until `stop` resolves or the server exits on its own
    ///
    /// `stop` yields the name of the signal that ended the loop.
    pub async fn run_until<F>(mut self, stop: F) -> Result<i32>
    where
        F: Future<Output = &'static str>,
    {
        info!("Initial sync: {}", self.sync.describe());
        let initial = execute_sync(Arc::clone(&self.sync), self.output_dir()).await;
        if let SyncReport::SpawnFailed(e) = initial {
            return Err(e);
        }
        if let Some(reason) = self.absorb(initial).await {
            return Ok(shutdown(reason, Some(&mut self.watcher), &mut self.supervisor).await);
        }

        self.supervisor.start()?;

        let mut triggers = match self.watcher.watch(&self.config.watch.paths).await {
            Ok(triggers) => triggers,
            Err(e) => {
                error!("Failed to start watcher: {}", e);
                let reason = ShutdownReason::Fatal(e.to_string());
                return Ok(shutdown(reason, None::<&mut FileWatcher>, &mut self.supervisor).await);
            }
        };
        info!(
            "Watching {} path(s) for changes",
            self.watcher.watched_paths().len()
        );

        tokio::pin!(stop);
        let reason = loop {
            tokio::select! {
                signal = &mut stop => break ShutdownReason::Signal(signal),
                Some(exit) = self.server_exits.recv() => {
                    if self.supervisor.handle_exit(&exit) {
                        break ShutdownReason::ServerExited { code: exit.code };
                    }
                }
                Some(trigger) = triggers.recv() => {
                    info!(coalesced = trigger.coalesced, "Change detected");
                    self.request_sync();
                }
                Some(report) = self.reports_rx.recv() => {
                    if let Some(reason) = self.complete_sync(report).await {
                        break reason;
                    }
                }
            }
        };

        Ok(shutdown(reason, Some(&mut self.watcher), &mut self.supervisor).await)
    }

    fn output_dir(&self) -> PathBuf {
        self.config.sync.output_dir.clone()
    }

    fn request_sync(&mut self) {
        match self.gate.request() {
            SyncAdmission::Start => self.spawn_sync(),
            SyncAdmission::Queued => debug!("Sync already running, queued one follow-up run"),
        }
    }

    fn spawn_sync(&self) {
        info!("Sync started: {}", self.sync.describe());
        let step = Arc::clone(&self.sync);
        let output_dir = self.output_dir();
        let reports = self.reports_tx.clone();

        tokio::spawn(async move {
            let report = execute_sync(step, output_dir).await;
            if reports.send(report).await.is_err() {
                debug!("Coordinator gone, dropping sync report");
            }
        });
    }

    /// Handle a finished run and start the owed follow-up run, if any
    async fn complete_sync(&mut self, report: SyncReport) -> Option<ShutdownReason> {
        if let Some(reason) = self.absorb(report).await {
            return Some(reason);
        }
        if self.gate.finish() {
            self.spawn_sync();
        }
        None
    }

    /// Log a sync result and restart the server if the output structure changed
    async fn absorb(&mut self, report: SyncReport) -> Option<ShutdownReason> {
        let snapshot = match report {
            SyncReport::SpawnFailed(e) => {
                error!("Sync could not be started: {}", e);
                return None;
            }
            SyncReport::Failed { code } => {
                warn!(?code, "Sync failed, keeping previous snapshot");
                return None;
            }
            SyncReport::Succeeded(Err(e)) => {
                warn!("Sync finished but its output could not be enumerated: {}", e);
                return None;
            }
            SyncReport::Succeeded(Ok(snapshot)) => snapshot,
        };

        let files = snapshot.len();
        match self.tracker.observe(snapshot) {
            SnapshotVerdict::Baseline => {
                info!(files, "Sync finished, baseline snapshot recorded");
                None
            }
            SnapshotVerdict::Unchanged => {
                info!(files, "Sync finished, output structure unchanged");
                None
            }
            SnapshotVerdict::Changed(diff) => {
                info!(%diff, "Output structure changed, restarting server");
                match self.supervisor.restart().await {
                    Ok(generation) => {
                        debug!(generation, "Server restarted");
                        None
                    }
                    Err(e) => {
                        error!("Failed to restart server: {}", e);
                        Some(ShutdownReason::Fatal(e.to_string()))
                    }
                }
            }
        }
    }
}

/// Run one sync and enumerate the output tree if it succeeded
async fn execute_sync(step: Arc<dyn SyncStep>, output_dir: PathBuf) -> SyncReport {
    match step.run().await {
        Err(e) => SyncReport::SpawnFailed(e),
        Ok(SyncOutcome::Failed { code }) => SyncReport::Failed { code },
        Ok(SyncOutcome::Succeeded) => {
            let snapshot =
                tokio::task::spawn_blocking(move || DirectorySnapshot::capture(&output_dir))
                    .await
                    .map_err(|e| Error::snapshot(format!("Snapshot task failed: {e}")))
                    .and_then(std::convert::identity);
            SyncReport::Succeeded(snapshot)
        }
    }
}

/// SIGINT and SIGTERM, registered once for the lifetime of the loop
#[cfg(unix)]
struct TerminationSignals {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl TerminationSignals {
    fn register() -> Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    async fn recv(mut self) -> &'static str {
        tokio::select! {
            _ = self.interrupt.recv() => "SIGINT",
            _ = self.terminate.recv() => "SIGTERM",
        }
    }
}

#[cfg(not(unix))]
struct TerminationSignals;

#[cfg(not(unix))]
impl TerminationSignals {
    fn register() -> Result<Self> {
        Ok(Self)
    }

    async fn recv(self) -> &'static str {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        "SIGINT"
    }
}
