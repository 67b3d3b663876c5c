//! Forward hardlinking of a ready title folder into the library tree.

use std::path::Path;

use tracing::{debug, warn};

/// Tally of a single forward link pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LinkReport {
    /// Files newly hardlinked.
    pub linked: u64,
    /// Files already present at the destination and left untouched.
    pub existing: u64,
    /// Files that could not be linked.
    pub failed: u64,
}

impl LinkReport {
    /// Whether every file is now satisfied at the destination.
    #[must_use]
    pub const fn success(&self) -> bool {
        self.failed == 0
    }
}

/// Hardlink every regular file directly inside `folder` into
/// `destination`, creating the destination tree if absent.
///
/// Existing destination entries are never overwritten. Individual link
/// failures are logged and counted but do not abort the pass; links
/// already created are left in place so a later retry only has the
/// missing ones to fill in. Subdirectories are not recursed into.
#[must_use]
pub fn mirror_folder(folder: &Path, destination: &Path) -> LinkReport {
    let mut report = LinkReport::default();

    if let Err(err) = std::fs::create_dir_all(destination) {
        warn!(
            path = %destination.display(),
            error = %err,
            "failed to create mirror directory"
        );
        report.failed += 1;
        return report;
    }

    let entries = match std::fs::read_dir(folder) {
        Ok(entries) => entries,
        Err(err) => {
            warn!(path = %folder.display(), error = %err, "failed to list title folder");
            report.failed += 1;
            return report;
        }
    };

    for entry in entries.filter_map(Result::ok) {
        if !entry.file_type().is_ok_and(|kind| kind.is_file()) {
            continue;
        }
        let source = entry.path();
        let target = destination.join(entry.file_name());
        if target.exists() {
            report.existing += 1;
            continue;
        }
        match std::fs::hard_link(&source, &target) {
            Ok(()) => {
                debug!(
                    source = %source.display(),
                    target = %target.display(),
                    "hardlinked file"
                );
                report.linked += 1;
            }
            Err(err) => {
                warn!(
                    source = %source.display(),
                    target = %target.display(),
                    error = %err,
                    "hardlink failed"
                );
                report.failed += 1;
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn title_folder(root: &Path, names: &[&str]) -> std::path::PathBuf {
        let folder = root.join("ABC-123");
        fs::create_dir_all(&folder).expect("folder");
        for name in names {
            fs::write(folder.join(name), b"payload").expect("file");
        }
        folder
    }

    #[test]
    fn mirrors_every_file() {
        let temp = TempDir::new().expect("tempdir");
        let folder = title_folder(temp.path(), &["video.strm", "video.nfo", "poster.jpg"]);
        let destination = temp.path().join("library").join("A").join("ABC-123");

        let report = mirror_folder(&folder, &destination);
        assert!(report.success());
        assert_eq!(report.linked, 3);
        for name in ["video.strm", "video.nfo", "poster.jpg"] {
            assert!(destination.join(name).exists());
        }
    }

    #[test]
    fn second_pass_is_idempotent() {
        let temp = TempDir::new().expect("tempdir");
        let folder = title_folder(temp.path(), &["video.strm", "video.nfo"]);
        let destination = temp.path().join("library").join("A").join("ABC-123");

        let first = mirror_folder(&folder, &destination);
        assert_eq!(first.linked, 2);

        let second = mirror_folder(&folder, &destination);
        assert!(second.success());
        assert_eq!(second.linked, 0);
        assert_eq!(second.existing, 2);
    }

    #[test]
    fn existing_destination_files_are_never_overwritten() {
        let temp = TempDir::new().expect("tempdir");
        let folder = title_folder(temp.path(), &["video.strm"]);
        let destination = temp.path().join("library").join("A").join("ABC-123");
        fs::create_dir_all(&destination).expect("destination");
        fs::write(destination.join("video.strm"), b"pre-existing").expect("file");

        let report = mirror_folder(&folder, &destination);
        assert!(report.success());
        assert_eq!(report.existing, 1);
        let content = fs::read(destination.join("video.strm")).expect("read");
        assert_eq!(content, b"pre-existing");
    }

    #[test]
    fn subdirectories_are_not_recursed() {
        let temp = TempDir::new().expect("tempdir");
        let folder = title_folder(temp.path(), &["video.strm"]);
        fs::create_dir_all(folder.join("extras")).expect("subdir");
        fs::write(folder.join("extras").join("bonus.jpg"), b"x").expect("file");
        let destination = temp.path().join("library").join("A").join("ABC-123");

        let report = mirror_folder(&folder, &destination);
        assert!(report.success());
        assert!(destination.join("video.strm").exists());
        assert!(!destination.join("extras").exists());
    }

    #[test]
    fn links_share_the_source_inode() {
        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;

            let temp = TempDir::new().expect("tempdir");
            let folder = title_folder(temp.path(), &["video.strm"]);
            let destination = temp.path().join("library").join("A").join("ABC-123");
            let report = mirror_folder(&folder, &destination);
            assert!(report.success());

            let source_ino = fs::metadata(folder.join("video.strm")).expect("meta").ino();
            let target_ino = fs::metadata(destination.join("video.strm"))
                .expect("meta")
                .ino();
            assert_eq!(source_ino, target_ino);
        }
    }
}
