//! Await-write-finish filtering
//!
//! A changed path is held back until its size and modification time have
//! stayed the same for the stability threshold, so that a trigger never
//! fires while an editor or generator is still writing. Paths that vanish
//! while pending are released at once.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::time::Instant;
use tracing::trace;

/// What the stability check knows about a file on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStamp {
    /// Size in bytes
    pub len: u64,
    /// Last modification time, where the platform reports one
    pub modified: Option<SystemTime>,
}

impl FileStamp {
    /// Create a new stamp
    pub fn new(len: u64, modified: Option<SystemTime>) -> Self {
        Self { len, modified }
    }
}

/// Read the current stamp of `path`, or `None` if it no longer exists
pub fn probe_file(path: &Path) -> Option<FileStamp> {
    let metadata = std::fs::metadata(path).ok()?;
    Some(FileStamp::new(metadata.len(), metadata.modified().ok()))
}

#[derive(Debug)]
struct PendingWrite {
    /// Last observed stamp; `None` until the first poll
    stamp: Option<FileStamp>,
    /// Since when the stamp has not changed
    stable_since: Instant,
}

/// Holds changed paths until they have stopped being written
#[derive(Debug)]
pub struct WriteStabilizer {
    threshold: Duration,
    pending: HashMap<PathBuf, PendingWrite>,
}

impl WriteStabilizer {
    /// Create a stabilizer with the given threshold
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            pending: HashMap::new(),
        }
    }

    /// Note that `path` changed at `now`
    pub fn observe(&mut self, path: PathBuf, now: Instant) {
        trace!("Awaiting write finish for {:?}", path);
        self.pending.insert(
            path,
            PendingWrite {
                stamp: None,
                stable_since: now,
            },
        );
    }

    /// Whether any path is still waiting to settle
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Re-check every pending path and release those that have settled
    ///
    /// `probe` returns the current stamp of a path, or `None` when the path is
    /// gone. Released paths are returned in no particular order.
    pub fn poll<F>(&mut self, now: Instant, mut probe: F) -> Vec<PathBuf>
    where
        F: FnMut(&Path) -> Option<FileStamp>,
    {
        let threshold = self.threshold;
        let mut settled = Vec::new();

        self.pending.retain(|path, write| match probe(path) {
            None => {
                settled.push(path.clone());
                false
            }
            Some(stamp) if write.stamp != Some(stamp) => {
                write.stamp = Some(stamp);
                write.stable_since = now;
                true
            }
            Some(_) => {
                if now.duration_since(write.stable_since) >= threshold {
                    settled.push(path.clone());
                    false
                } else {
                    true
                }
            }
        });

        settled
    }
}
