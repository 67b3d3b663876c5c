#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Shared test helpers used across the workspace suites.
//! Layout: fixtures.rs (directory trees and settings builders).

pub mod fixtures;

pub use fixtures::{ready_title_folder, scratch_dir, settings_for, title_folder_with};
