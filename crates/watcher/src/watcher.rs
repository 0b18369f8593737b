//! Core file system watcher implementation
//!
//! This module wires the notify crate to the stability filter and the
//! trailing debouncer. One background task owns both state machines and
//! multiplexes raw events, the stability poll tick and the debounce deadline.

use crate::{
    config::WatcherConfig,
    debouncer::TrailingDebouncer,
    events::Trigger,
    ignore::IgnoreFilter,
    stability::{probe_file, WriteStabilizer},
};
use devloop_core::error::{Error, Result};
use notify::{
    event::{AccessKind, AccessMode, ModifyKind, MetadataKind},
    Config as NotifyConfig, Event as NotifyEvent, EventKind, RecommendedWatcher, RecursiveMode,
    Watcher as NotifyWatcher,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

type RawEvent = std::result::Result<NotifyEvent, notify::Error>;

/// Main file system watcher
pub struct FileWatcher {
    /// Configuration
    config: Arc<WatcherConfig>,
    /// Ignore filter
    ignore_filter: Arc<IgnoreFilter>,
    /// Active notify watcher
    watcher: Option<RecommendedWatcher>,
    /// Paths being watched
    watched_paths: Vec<PathBuf>,
    /// Event pipeline task
    pipeline: Option<JoinHandle<()>>,
    /// Cancellation token for stopping the pipeline
    cancellation_token: CancellationToken,
}

impl FileWatcher {
    /// Create a new file watcher
    pub fn new(config: WatcherConfig) -> Result<Self> {
        let ignore_filter = IgnoreFilter::from_patterns(config.ignore_patterns.clone())
            .map_err(|e| Error::watcher(format!("Failed to create ignore filter: {e}")))?;

        Ok(Self {
            config: Arc::new(config),
            ignore_filter: Arc::new(ignore_filter),
            watcher: None,
            watched_paths: Vec::new(),
            pipeline: None,
            cancellation_token: CancellationToken::new(),
        })
    }

    /// Start watching the given roots recursively
    ///
    /// Roots that cannot be watched are logged and skipped. Fails only when
    /// none of them could be watched. Returns the stream of debounced triggers.
    pub async fn watch(&mut self, roots: &[PathBuf]) -> Result<mpsc::Receiver<Trigger>> {
        if self.watcher.is_some() {
            return Err(Error::watcher("Watcher is already running"));
        }

        self.cancellation_token = CancellationToken::new();
        let (raw_tx, raw_rx) = mpsc::channel(self.config.max_queue_size);
        let (trigger_tx, trigger_rx) = mpsc::channel(self.config.trigger_buffer);

        let mut watcher = Self::create_notify_watcher(raw_tx)?;
        for root in roots {
            match watcher.watch(root, RecursiveMode::Recursive) {
                Ok(()) => {
                    info!("Watching path: {:?}", root);
                    self.watched_paths.push(root.clone());
                }
                Err(e) => warn!("Skipping watch path {:?}: {}", root, e),
            }
        }

        if self.watched_paths.is_empty() {
            return Err(Error::watcher(format!(
                "None of the watch paths could be watched: {roots:?}"
            )));
        }

        self.pipeline = Some(tokio::spawn(run_pipeline(
            raw_rx,
            Arc::clone(&self.ignore_filter),
            Arc::clone(&self.config),
            trigger_tx,
            self.cancellation_token.clone(),
        )));
        self.watcher = Some(watcher);

        Ok(trigger_rx)
    }

    /// Create a notify watcher forwarding into the raw event channel
    fn create_notify_watcher(tx: mpsc::Sender<RawEvent>) -> Result<RecommendedWatcher> {
        let config = NotifyConfig::default().with_compare_contents(false);

        RecommendedWatcher::new(
            move |res: RawEvent| {
                if let Err(e) = tx.try_send(res) {
                    // A full queue already holds pending changes that will trigger.
                    trace!("Dropping raw notify event: {}", e);
                }
            },
            config,
        )
        .map_err(|e| Error::watcher(format!("Failed to create watcher: {e}")))
    }

    /// Stop watching all paths
    ///
    /// Every root is unwatched even if one fails; the first failure is returned.
    pub async fn stop(&mut self) -> Result<()> {
        self.cancellation_token.cancel();

        let mut first_error = None;
        if let Some(mut watcher) = self.watcher.take() {
            for path in self.watched_paths.drain(..) {
                if let Err(e) = watcher.unwatch(&path) {
                    debug!("Failed to unwatch {:?}: {}", path, e);
                    first_error.get_or_insert_with(|| {
                        Error::watcher(format!("Failed to unwatch {path:?}: {e}"))
                    });
                }
            }
            info!("File watcher stopped");
        }

        if let Some(pipeline) = self.pipeline.take() {
            if let Err(e) = pipeline.await {
                first_error.get_or_insert_with(|| {
                    Error::watcher(format!("Watcher pipeline ended abnormally: {e}"))
                });
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Get currently watched paths
    pub fn watched_paths(&self) -> &[PathBuf] {
        &self.watched_paths
    }
}

/// Whether a notify event kind represents a change to the watch set
fn is_change(kind: &EventKind) -> bool {
    match kind {
        EventKind::Create(_) | EventKind::Remove(_) | EventKind::Any => true,
        EventKind::Modify(ModifyKind::Metadata(MetadataKind::AccessTime)) => false,
        EventKind::Modify(_) => true,
        EventKind::Access(AccessKind::Close(AccessMode::Write)) => true,
        EventKind::Access(_) | EventKind::Other => false,
    }
}

/// Paths of an event that should count as change requests
fn relevant_paths(event: NotifyEvent, ignore_filter: &IgnoreFilter) -> Vec<PathBuf> {
    if !is_change(&event.kind) {
        return Vec::new();
    }
    event
        .paths
        .into_iter()
        .filter(|path| {
            let ignored = ignore_filter.should_ignore(path);
            if ignored {
                trace!("Ignoring path: {:?}", path);
            }
            !ignored
        })
        .collect()
}

/// Event pipeline: raw events → stability filter → debouncer → triggers
async fn run_pipeline(
    mut raw_rx: mpsc::Receiver<RawEvent>,
    ignore_filter: Arc<IgnoreFilter>,
    config: Arc<WatcherConfig>,
    trigger_tx: mpsc::Sender<Trigger>,
    cancel: CancellationToken,
) {
    let mut stabilizer = WriteStabilizer::new(config.stability_threshold());
    let mut debouncer = TrailingDebouncer::new(config.debounce_duration());
    let mut poll = tokio::time::interval(config.poll_interval());
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        // Far-future placeholder; the branch is disabled when nothing is pending.
        let deadline = debouncer
            .deadline()
            .unwrap_or_else(|| Instant::now() + Duration::from_secs(3600));

        // Arms are polled in order: changes that settle at the deadline
        // instant are recorded before the deadline arm can fire.
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break,
            raw = raw_rx.recv() => match raw {
                Some(Ok(event)) => {
                    trace!("Received notify event: {:?}", event);
                    for path in relevant_paths(event, &ignore_filter) {
                        debug!("Change detected: {}", path.display());
                        stabilizer.observe(path, Instant::now());
                    }
                }
                Some(Err(e)) => warn!("Watch error (ignored): {}", e),
                None => break,
            },
            _ = poll.tick(), if stabilizer.has_pending() => {
                let now = Instant::now();
                for path in stabilizer.poll(now, probe_file) {
                    trace!("Write settled: {:?}", path);
                    debouncer.record(now);
                }
            },
            _ = tokio::time::sleep_until(deadline), if debouncer.is_pending() => {
                if let Some(trigger) = debouncer.poll_fire(Instant::now()) {
                    debug!(coalesced = trigger.coalesced, "Debounced trigger fired");
                    if trigger_tx.send(trigger).await.is_err() {
                        break;
                    }
                }
            },
        }
    }

    debug!("Watcher pipeline stopped");
}
