//! Trigger type emitted by the watcher

/// A consolidated "something changed under the watch set" signal
///
/// One trigger stands for every change request that arrived before the
/// debounce quiet window elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trigger {
    /// Number of settled changes folded into this trigger
    pub coalesced: usize,
}

impl Trigger {
    /// Create a new trigger
    pub fn new(coalesced: usize) -> Self {
        Self { coalesced }
    }
}
