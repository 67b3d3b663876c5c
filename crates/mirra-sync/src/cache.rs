//! In-memory record of title folders that have already been mirrored.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

/// Set of staging title folders whose library mirror is known to exist.
///
/// Membership is best effort: it is populated only after a fully
/// successful link pass and cleared wholesale on reconfiguration and at
/// the start of a full reconciliation. Keys are normalised so that the
/// insertion path and the deletion path agree on equality.
#[derive(Debug, Default)]
pub struct DedupCache {
    entries: HashSet<PathBuf>,
}

/// Normalise a path into the canonical cache key form: current-directory
/// segments dropped, trailing separators removed.
#[must_use]
pub fn normalize_key(path: &Path) -> PathBuf {
    path.components()
        .filter(|component| !matches!(component, Component::CurDir))
        .collect()
}

impl DedupCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a folder as mirrored. Returns `true` if it was not already
    /// present.
    pub fn insert(&mut self, folder: &Path) -> bool {
        self.entries.insert(normalize_key(folder))
    }

    /// Forget a folder. Returns `true` if it was present.
    pub fn remove(&mut self, folder: &Path) -> bool {
        self.entries.remove(&normalize_key(folder))
    }

    /// Whether a folder is recorded as mirrored.
    #[must_use]
    pub fn contains(&self, folder: &Path) -> bool {
        self.entries.contains(&normalize_key(folder))
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of recorded folders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_remove_round_trip() {
        let mut cache = DedupCache::new();
        assert!(cache.insert(Path::new("/staging/Actor/ABC-123")));
        assert!(!cache.insert(Path::new("/staging/Actor/ABC-123")));
        assert!(cache.contains(Path::new("/staging/Actor/ABC-123")));
        assert!(cache.remove(Path::new("/staging/Actor/ABC-123")));
        assert!(cache.is_empty());
    }

    #[test]
    fn keys_are_normalised_on_both_paths() {
        let mut cache = DedupCache::new();
        assert!(cache.insert(Path::new("/staging/Actor/ABC-123/")));
        assert!(cache.contains(Path::new("/staging/Actor/./ABC-123")));
        assert!(cache.remove(Path::new("/staging/./Actor/ABC-123")));
        assert!(cache.is_empty());
    }

    #[test]
    fn clear_drops_everything() {
        let mut cache = DedupCache::new();
        cache.insert(Path::new("/a/b/c"));
        cache.insert(Path::new("/a/b/d"));
        assert_eq!(cache.len(), 2);
        cache.clear();
        assert!(cache.is_empty());
    }
}
