//! Broadcast deletion of a staging entry across library buckets.

use std::ffi::OsStr;
use std::path::Path;

use tracing::{info, warn};

/// Remove every entry named `name` from the classification buckets under
/// `destination_root`, returning the number of entries removed.
///
/// The classification key cannot be recomputed for a deleted path (its
/// content is gone), so every bucket is checked. Individual removal
/// failures are logged and skipped.
#[must_use]
pub fn propagate_delete(name: &OsStr, destination_root: &Path) -> u64 {
    if !destination_root.is_dir() {
        return 0;
    }

    let buckets = match std::fs::read_dir(destination_root) {
        Ok(entries) => entries,
        Err(err) => {
            warn!(path = %destination_root.display(), error = %err, "failed to list library root");
            return 0;
        }
    };

    let mut removed = 0;
    for bucket in buckets.filter_map(Result::ok) {
        if !bucket.file_type().is_ok_and(|kind| kind.is_dir()) {
            continue;
        }
        let candidate = bucket.path().join(name);
        if !candidate.exists() {
            continue;
        }
        let result = if candidate.is_dir() {
            std::fs::remove_dir_all(&candidate)
        } else {
            std::fs::remove_file(&candidate)
        };
        match result {
            Ok(()) => {
                info!(path = %candidate.display(), "removed mirrored entry");
                removed += 1;
            }
            Err(err) => {
                warn!(path = %candidate.display(), error = %err, "failed to remove mirrored entry");
            }
        }
    }
    removed
}
