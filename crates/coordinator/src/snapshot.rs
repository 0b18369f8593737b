//! Structural snapshots of the synchronized output tree
//!
//! A snapshot is the sorted list of relative file paths under a directory.
//! Two snapshots are equal iff those lists are identical; file contents are
//! never looked at, so editing an existing page does not count as a change.

use devloop_core::error::{Error, Result};
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use tracing::{debug, trace};
use walkdir::WalkDir;

/// Sorted relative file paths of a directory tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectorySnapshot {
    paths: Vec<String>,
}

impl DirectorySnapshot {
    /// Build a snapshot from arbitrary paths; they are sorted and deduplicated
    pub fn from_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut paths: Vec<String> = paths.into_iter().map(Into::into).collect();
        paths.sort();
        paths.dedup();
        Self { paths }
    }

    /// Enumerate every file below `root`
    ///
    /// Paths are relative to `root` and use `/` as separator. Directory
    /// symlinks are not descended into; a symlink resolving to a file is
    /// listed under its own name. A missing root yields an empty snapshot.
    pub fn capture(root: &Path) -> Result<Self> {
        if !root.exists() {
            debug!("Snapshot root {:?} does not exist, using empty snapshot", root);
            return Ok(Self::default());
        }

        let mut paths = Vec::new();
        for entry in WalkDir::new(root).follow_links(false) {
            let entry = entry
                .map_err(|e| Error::snapshot(format!("Failed to walk {}: {e}", root.display())))?;
            let file_type = entry.file_type();
            let is_file =
                file_type.is_file() || (file_type.is_symlink() && entry.path().is_file());
            if !is_file {
                continue;
            }
            let relative = entry.path().strip_prefix(root).map_err(|e| {
                Error::snapshot(format!("{:?} is outside {:?}: {e}", entry.path(), root))
            })?;
            let joined = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            trace!("Snapshot entry: {}", joined);
            paths.push(joined);
        }

        Ok(Self::from_paths(paths))
    }

    /// The sorted paths
    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    /// Number of paths
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Whether the snapshot is empty
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Paths added and removed going from `self` to `newer`
    pub fn diff(&self, newer: &Self) -> SnapshotDiff {
        let before: BTreeSet<&String> = self.paths.iter().collect();
        let after: BTreeSet<&String> = newer.paths.iter().collect();

        SnapshotDiff {
            added: after.difference(&before).map(|p| (*p).clone()).collect(),
            removed: before.difference(&after).map(|p| (*p).clone()).collect(),
        }
    }
}

/// Whether the structure changed between two snapshots
pub fn compare(previous: &DirectorySnapshot, current: &DirectorySnapshot) -> bool {
    previous.paths != current.paths
}

/// Added and removed paths between two snapshots
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl SnapshotDiff {
    /// Whether nothing was added or removed
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

impl fmt::Display for SnapshotDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "+{} -{}", self.added.len(), self.removed.len())
    }
}

/// Result of feeding a fresh snapshot to the tracker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotVerdict {
    /// First snapshot; recorded without a restart decision
    Baseline,
    /// Same structure as the baseline
    Unchanged,
    /// Structure differs from the baseline
    Changed(SnapshotDiff),
}

/// Keeps the last known-good snapshot for comparison
#[derive(Debug, Default)]
pub struct SnapshotTracker {
    baseline: Option<DirectorySnapshot>,
}

impl SnapshotTracker {
    /// Create a tracker without a baseline
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare `current` to the baseline and make it the new baseline
    pub fn observe(&mut self, current: DirectorySnapshot) -> SnapshotVerdict {
        let verdict = match &self.baseline {
            None => SnapshotVerdict::Baseline,
            Some(previous) if compare(previous, &current) => {
                SnapshotVerdict::Changed(previous.diff(&current))
            }
            Some(_) => SnapshotVerdict::Unchanged,
        };
        self.baseline = Some(current);
        verdict
    }

    /// The snapshot the next comparison will use
    pub fn baseline(&self) -> Option<&DirectorySnapshot> {
        self.baseline.as_ref()
    }
}
