//! Readiness rules and classification for title folders.
//!
//! A title folder qualifies for mirroring once it holds a pointer file, a
//! metadata file with the same base name, and the fixed poster, fanart,
//! and thumbnail images. All name comparisons are case-insensitive.

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

/// Extension of the streamed-media placeholder file.
pub const POINTER_EXTENSION: &str = ".strm";

/// Extension of the metadata description file.
pub const METADATA_EXTENSION: &str = ".nfo";

/// Image files that must all be present, by exact lowercase name.
pub const REQUIRED_IMAGES: [&str; 3] = ["poster.jpg", "fanart.jpg", "thumb.jpg"];

/// Bucket used when a folder name does not match the identifier grammar.
pub const FALLBACK_BUCKET: &str = "unclassified";

/// Path segments that mark transient or system folders.
const IGNORED_SEGMENTS: [&str; 3] = ["@Recycle", "#recycle", "@eaDir"];

/// Identifier grammar: a letter-led prefix, an optional `-PPV` marker, an
/// optional separator, then digits. Digit-only names deliberately fall
/// through to the fallback bucket.
static IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^([A-Z][A-Z0-9]*(?:-PPV)?)-?(\d+)").expect("identifier pattern is valid")
});

/// Outcome of evaluating a title folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadinessResult {
    /// Whether the folder qualifies for mirroring.
    pub ready: bool,
    /// Classification bucket derived from the folder name.
    pub class_key: String,
}

impl ReadinessResult {
    fn not_ready() -> Self {
        Self {
            ready: false,
            class_key: String::new(),
        }
    }
}

/// Whether any segment of the path names a transient or system folder.
#[must_use]
pub fn is_ignored_path(path: &Path) -> bool {
    path.components().any(|component| {
        component.as_os_str().to_str().is_some_and(|segment| {
            segment.starts_with('.') || IGNORED_SEGMENTS.contains(&segment)
        })
    })
}

/// Derive the classification bucket for a folder name.
#[must_use]
pub fn classify(name: &str) -> String {
    IDENTIFIER.captures(name).map_or_else(
        || FALLBACK_BUCKET.to_string(),
        |captures| {
            captures[1]
                .chars()
                .next()
                .map_or_else(|| FALLBACK_BUCKET.to_string(), |first| {
                    first.to_ascii_uppercase().to_string()
                })
        },
    )
}

/// Evaluate a title folder against the readiness rules.
///
/// Side-effect free: only lists the folder's direct children. Listing
/// failures (folder vanished mid-evaluation) yield a not-ready result.
#[must_use]
pub fn evaluate(folder: &Path) -> ReadinessResult {
    if is_ignored_path(folder) {
        return ReadinessResult::not_ready();
    }

    let entries = match std::fs::read_dir(folder) {
        Ok(entries) => entries,
        Err(err) => {
            warn!(path = %folder.display(), error = %err, "failed to list title folder");
            return ReadinessResult::not_ready();
        }
    };

    let mut file_names: Vec<String> = entries
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_ok_and(|kind| kind.is_file()))
        .filter_map(|entry| entry.file_name().to_str().map(str::to_lowercase))
        .collect();
    file_names.sort_unstable();

    let pointer = file_names
        .iter()
        .find(|name| name.ends_with(POINTER_EXTENSION));
    let metadata = file_names
        .iter()
        .find(|name| name.ends_with(METADATA_EXTENSION));
    let images_present = REQUIRED_IMAGES
        .iter()
        .all(|image| file_names.iter().any(|name| name == image));

    let (Some(pointer), Some(metadata)) = (pointer, metadata) else {
        return ReadinessResult::not_ready();
    };
    if !images_present {
        return ReadinessResult::not_ready();
    }

    // Strip a single extension so names like `a.strm.strm` keep their
    // inner suffix in the comparison.
    let pointer_stem = pointer
        .strip_suffix(POINTER_EXTENSION)
        .unwrap_or(pointer.as_str());
    let metadata_stem = metadata
        .strip_suffix(METADATA_EXTENSION)
        .unwrap_or(metadata.as_str());
    if pointer_stem != metadata_stem {
        return ReadinessResult::not_ready();
    }

    let name = folder
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default();
    ReadinessResult {
        ready: true,
        class_key: classify(name),
    }
}
