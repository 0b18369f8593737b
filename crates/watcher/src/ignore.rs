//! File ignore pattern matching
//!
//! This module provides glob-based filtering of watch events so build, cache
//! and output directories never trigger a sync.

use glob::{MatchOptions, Pattern, PatternError};
use std::path::Path;
use std::sync::Arc;
use tracing::trace;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Manages file ignore patterns and filtering
///
/// By default, ignores nothing. Only excludes paths that match
/// explicit ignore patterns.
#[derive(Clone, Default)]
pub struct IgnoreFilter {
    /// Glob patterns to ignore
    patterns: Arc<Vec<Pattern>>,
}

impl IgnoreFilter {
    /// Compile a filter from glob patterns
    pub fn from_patterns(patterns: Vec<String>) -> Result<Self, PatternError> {
        let compiled = patterns
            .iter()
            .map(|p| Pattern::new(p))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            patterns: Arc::new(compiled),
        })
    }

    /// Check if a path should be ignored
    ///
    /// Patterns are tested against the full path, and against the path with a
    /// trailing separator so that `**/.git/**` also covers the `.git` directory
    /// entry itself.
    pub fn should_ignore(&self, path: &Path) -> bool {
        let path_str = path.to_string_lossy();
        let as_dir = format!("{path_str}/");
        for pattern in self.patterns.iter() {
            if pattern.matches_with(&path_str, MATCH_OPTIONS)
                || pattern.matches_with(&as_dir, MATCH_OPTIONS)
            {
                trace!("Path {:?} matches ignore pattern {}", path, pattern);
                return true;
            }
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_filter() -> IgnoreFilter {
        IgnoreFilter::from_patterns(vec![
            "**/.git/**".to_string(),
            "**/.cache/**".to_string(),
            "**/.venv/**".to_string(),
            "**/occt/**".to_string(),
        ])
        .expect("valid patterns")
    }

    #[test]
    fn test_empty_filter_ignores_nothing() {
        let filter = IgnoreFilter::default();
        assert!(!filter.should_ignore(Path::new("/repo/notes/a.md")));
    }

    #[test]
    fn test_ignore_filter_patterns() {
        let filter = default_filter();

        assert!(filter.should_ignore(Path::new("/repo/notes/.git/HEAD")));
        assert!(filter.should_ignore(Path::new("/repo/repros/.cache/x/y.bin")));
        assert!(filter.should_ignore(Path::new("/repo/repros/occt/src/gp.cxx")));
        assert!(!filter.should_ignore(Path::new("/repo/notes/intro.md")));
        assert!(!filter.should_ignore(Path::new("/repo/repros/occt-notes.md")));
    }

    #[test]
    fn test_ignore_filter_matches_directory_entry_itself() {
        let filter = default_filter();
        assert!(filter.should_ignore(Path::new("/repo/notes/.git")));
        assert!(filter.should_ignore(Path::new("/repo/repros/.venv")));
    }

    #[test]
    fn test_ignore_filter_simple_globs() {
        let filter = IgnoreFilter::from_patterns(vec!["*.swp".to_string()]).expect("valid");
        assert!(filter.should_ignore(Path::new("/repo/notes/.intro.md.swp")));
        assert!(!filter.should_ignore(Path::new("/repo/notes/intro.md")));
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        assert!(IgnoreFilter::from_patterns(vec!["[".to_string()]).is_err());
    }
}
