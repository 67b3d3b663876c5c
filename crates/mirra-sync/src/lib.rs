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
    clippy::cargo,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions, clippy::multiple_crate_versions)]

//! Hardlink synchronization engine for media title folders.
//!
//! Watches configured staging and library roots, mirrors complete title
//! folders into classification buckets via hardlinks, propagates sidecar
//! files back to staging, and broadcasts deletions.

pub mod backlink;
pub mod cache;
pub mod deletion;
mod engine;
pub mod error;
pub mod mapping;
pub mod materialize;
pub mod readiness;
mod router;
mod watch;

pub use engine::SyncEngine;
pub use error::{SyncError, SyncResult};
pub use router::{EVENT_CHANNEL_CAPACITY, EventRouter};
pub use watch::{FsEvent, FsEventKind, WatchSupervisor};
