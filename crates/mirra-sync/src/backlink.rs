//! Propagation of library-side sidecar files back into the staging tree.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

/// Extension of sidecar files that travel back to the staging tree.
pub const SIDECAR_EXTENSION: &str = ".json";

/// Whether a path names a sidecar file.
#[must_use]
pub fn is_sidecar(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.to_lowercase().ends_with(SIDECAR_EXTENSION))
}

/// Hardlink a library-side sidecar file into the matching staging title
/// folder.
///
/// The title name is the sidecar's immediate parent folder. Collection
/// directories under `source_root` are scanned in name order; the first
/// one holding a same-named title folder receives the link. Returns the
/// created path, or `None` when nothing was done (no match, or the link
/// already exists).
#[must_use]
pub fn propagate_sidecar(sidecar: &Path, source_root: &Path) -> Option<PathBuf> {
    let file_name = sidecar.file_name()?;
    let title = sidecar.parent()?.file_name()?.to_os_string();

    if !source_root.is_dir() {
        return None;
    }

    let mut collections: Vec<PathBuf> = match std::fs::read_dir(source_root) {
        Ok(entries) => entries
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_ok_and(|kind| kind.is_dir()))
            .map(|entry| entry.path())
            .collect(),
        Err(err) => {
            warn!(path = %source_root.display(), error = %err, "failed to list staging root");
            return None;
        }
    };
    collections.sort_unstable();

    let mut matches = collections
        .into_iter()
        .map(|collection| collection.join(&title))
        .filter(|candidate| candidate.is_dir());

    let target_folder = matches.next()?;
    if matches.next().is_some() {
        // Title folder names are expected to be unique across collections;
        // only the first match receives the sidecar.
        debug!(
            title = %title.to_string_lossy(),
            "title folder present in multiple collections"
        );
    }

    let back_link = target_folder.join(file_name);
    if back_link.exists() {
        return None;
    }
    match std::fs::hard_link(sidecar, &back_link) {
        Ok(()) => {
            info!(
                title = %title.to_string_lossy(),
                file = %file_name.to_string_lossy(),
                "sidecar linked back to staging"
            );
            Some(back_link)
        }
        Err(err) => {
            warn!(
                source = %sidecar.display(),
                target = %back_link.display(),
                error = %err,
                "sidecar backlink failed"
            );
            None
        }
    }
}
