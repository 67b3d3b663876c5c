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

//! Settings model and loader for the Mirra service.

mod error;
mod loader;
mod model;

pub use error::{ConfigError, ConfigResult};
pub use loader::{
    CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH, config_path_from_env, load_from_env, load_settings,
};
pub use model::{
    DEFAULT_HTTP_PORT, DEFAULT_POLL_INTERVAL_SECS, MappingPair, SyncSettings, WatchMode,
};
