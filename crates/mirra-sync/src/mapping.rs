//! Bidirectional table of configured staging and library roots.

use std::path::{Path, PathBuf};

use mirra_config::MappingPair;
use tracing::{error, info};

/// Which side of a mapping a watched root belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootRole {
    /// The root is a staging root; carries its mapped library root.
    Source {
        /// Library root receiving mirrors from this staging root.
        destination: PathBuf,
    },
    /// The root is a library root; carries its mapped staging root.
    Destination {
        /// Staging root this library root mirrors.
        source: PathBuf,
    },
}

/// Configured source-to-destination directory pairs, queryable in both
/// directions. Rebuilt wholesale on every reconfiguration, never mutated
/// in place.
#[derive(Debug, Clone, Default)]
pub struct MappingTable {
    pairs: Vec<MappingPair>,
}

impl MappingTable {
    /// Replace the table with the given pairs.
    ///
    /// Missing library roots are created so watchers can attach to them.
    /// A creation failure is logged and leaves the pair in the table; the
    /// destination-side watch for that pair will simply not start.
    #[must_use]
    pub fn configure(pairs: Vec<MappingPair>) -> Self {
        for pair in &pairs {
            if !pair.destination.exists() {
                match std::fs::create_dir_all(&pair.destination) {
                    Ok(()) => {
                        info!(path = %pair.destination.display(), "created missing library root");
                    }
                    Err(err) => {
                        error!(
                            path = %pair.destination.display(),
                            error = %err,
                            "failed to create library root"
                        );
                    }
                }
            }
        }
        Self { pairs }
    }

    /// Library root mapped from the given staging root.
    #[must_use]
    pub fn destination_for(&self, source: &Path) -> Option<&Path> {
        self.pairs
            .iter()
            .find(|pair| pair.source == source)
            .map(|pair| pair.destination.as_path())
    }

    /// Staging root mapped back from the given library root.
    #[must_use]
    pub fn source_for(&self, destination: &Path) -> Option<&Path> {
        self.pairs
            .iter()
            .find(|pair| pair.destination == destination)
            .map(|pair| pair.source.as_path())
    }

    /// Classify a watched root as staging side or library side.
    ///
    /// Staging roots take precedence when a path appears on both sides.
    #[must_use]
    pub fn role_of(&self, root: &Path) -> Option<RootRole> {
        if let Some(destination) = self.destination_for(root) {
            return Some(RootRole::Source {
                destination: destination.to_path_buf(),
            });
        }
        self.source_for(root).map(|source| RootRole::Destination {
            source: source.to_path_buf(),
        })
    }

    /// All configured pairs.
    #[must_use]
    pub fn pairs(&self) -> &[MappingPair] {
        &self.pairs
    }

    /// Every root a watcher should attach to, staging roots first.
    #[must_use]
    pub fn watch_roots(&self) -> Vec<PathBuf> {
        let mut roots = Vec::with_capacity(self.pairs.len() * 2);
        for pair in &self.pairs {
            roots.push(pair.source.clone());
        }
        for pair in &self.pairs {
            roots.push(pair.destination.clone());
        }
        roots
    }

    /// Whether the table holds any pairs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Roots that are configured but currently absent from the filesystem.
    ///
    /// A missing staging root means nothing is being mirrored from it; a
    /// missing library root means creation failed at configure time or the
    /// directory was removed since.
    #[must_use]
    pub fn degraded(&self) -> Vec<String> {
        let mut entries = Vec::new();
        for pair in &self.pairs {
            if !pair.source.is_dir() {
                entries.push(format!("staging_root:{}", pair.source.display()));
            }
            if !pair.destination.is_dir() {
                entries.push(format!("library_root:{}", pair.destination.display()));
            }
        }
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn pair(source: &Path, destination: &Path) -> MappingPair {
        MappingPair {
            source: source.to_path_buf(),
            destination: destination.to_path_buf(),
        }
    }

    #[test]
    fn configure_creates_missing_destinations() {
        let temp = TempDir::new().expect("tempdir");
        let source = temp.path().join("staging");
        let destination = temp.path().join("library");
        std::fs::create_dir_all(&source).expect("staging");

        let table = MappingTable::configure(vec![pair(&source, &destination)]);
        assert!(destination.is_dir());
        assert_eq!(table.destination_for(&source), Some(destination.as_path()));
        assert_eq!(table.source_for(&destination), Some(source.as_path()));
    }

    #[test]
    fn role_of_resolves_both_sides() {
        let temp = TempDir::new().expect("tempdir");
        let source = temp.path().join("staging");
        let destination = temp.path().join("library");
        let table = MappingTable::configure(vec![pair(&source, &destination)]);

        assert_eq!(
            table.role_of(&source),
            Some(RootRole::Source {
                destination: destination.clone()
            })
        );
        assert_eq!(
            table.role_of(&destination),
            Some(RootRole::Destination {
                source: source.clone()
            })
        );
        assert_eq!(table.role_of(Path::new("/unrelated")), None);
    }

    #[test]
    fn degraded_names_missing_roots() {
        let temp = TempDir::new().expect("tempdir");
        let source = temp.path().join("staging");
        let destination = temp.path().join("library");
        let table = MappingTable::configure(vec![pair(&source, &destination)]);

        // The library root was created by configure; only staging is absent.
        let entries = table.degraded();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].starts_with("staging_root:"));

        std::fs::create_dir_all(&source).expect("staging");
        assert!(table.degraded().is_empty());
    }

    #[test]
    fn watch_roots_lists_both_sides() {
        let temp = TempDir::new().expect("tempdir");
        let source = temp.path().join("staging");
        let destination = temp.path().join("library");
        let table = MappingTable::configure(vec![pair(&source, &destination)]);

        let roots = table.watch_roots();
        assert_eq!(roots, vec![source, destination]);
    }
}
