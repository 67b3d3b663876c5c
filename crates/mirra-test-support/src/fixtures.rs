//! Directory tree and settings fixtures.

use std::path::{Path, PathBuf};

use mirra_config::SyncSettings;
use tempfile::TempDir;

/// Temporary directory with a visible name.
///
/// `TempDir::new` prefixes directories with `.tmp`, which the sync rules
/// treat as a hidden segment; suites exercising those rules need a root
/// that is not filtered out.
///
/// # Panics
///
/// Panics if the directory cannot be created.
#[must_use]
pub fn scratch_dir() -> TempDir {
    tempfile::Builder::new()
        .prefix("mirra-test-")
        .tempdir()
        .expect("create scratch dir")
}

/// Files that make a title folder ready for mirroring.
pub const READY_FILES: [&str; 5] = [
    "video.strm",
    "video.nfo",
    "poster.jpg",
    "fanart.jpg",
    "thumb.jpg",
];

/// Create a title folder named `name` under `collection` holding the
/// given files.
///
/// # Panics
///
/// Panics if the directories or files cannot be created.
pub fn title_folder_with(collection: &Path, name: &str, files: &[&str]) -> PathBuf {
    let folder = collection.join(name);
    std::fs::create_dir_all(&folder).expect("create title folder");
    for file in files {
        std::fs::write(folder.join(file), b"fixture").expect("write fixture file");
    }
    folder
}

/// Create a complete, ready title folder named `name` under `collection`.
///
/// # Panics
///
/// Panics if the directories or files cannot be created.
pub fn ready_title_folder(collection: &Path, name: &str) -> PathBuf {
    title_folder_with(collection, name, &READY_FILES)
}

/// Settings with a single enabled mapping from `staging` to `library`.
#[must_use]
pub fn settings_for(staging: &Path, library: &Path) -> SyncSettings {
    SyncSettings {
        enabled: true,
        mappings: format!("{}:{}", staging.display(), library.display()),
        ..SyncSettings::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn ready_title_folder_creates_all_files() {
        let temp = TempDir::new().expect("tempdir");
        let folder = ready_title_folder(&temp.path().join("Actor"), "ABC-123");
        for file in READY_FILES {
            assert!(folder.join(file).exists());
        }
    }

    #[test]
    fn settings_for_produces_one_valid_mapping() {
        let temp = TempDir::new().expect("tempdir");
        let settings = settings_for(&temp.path().join("staging"), &temp.path().join("library"));
        assert!(settings.enabled);
        assert_eq!(settings.mapping_pairs().len(), 1);
    }
}
