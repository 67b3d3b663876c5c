//! Error types for configuration operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Field contained an invalid value.
    #[error("invalid configuration field")]
    InvalidField {
        /// Field that failed validation.
        field: &'static str,
        /// Offending value when available.
        value: Option<String>,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
    /// Watch mode value was invalid.
    #[error("invalid watch mode")]
    InvalidWatchMode {
        /// Watch mode payload provided by the caller.
        value: String,
    },
    /// Bind address value was invalid.
    #[error("invalid bind address")]
    InvalidBindAddr {
        /// Bind address payload provided by the caller.
        value: String,
    },
    /// Configuration file could not be parsed.
    #[error("failed to parse configuration file")]
    Parse {
        /// Path of the offending file.
        path: PathBuf,
        /// Source parse error.
        source: toml::de::Error,
    },
    /// File system operation failed.
    #[error("filesystem operation failed")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Path involved in the operation.
        path: PathBuf,
        /// Source IO error.
        source: io::Error,
    },
}

/// Convenience alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;
