//! Configuration model for the sync service.

use std::fmt;
use std::net::IpAddr;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ConfigError;

/// Default HTTP listener port.
pub const DEFAULT_HTTP_PORT: u16 = 9190;

/// Default polling interval when the polling watch mode is selected.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;

/// Strategy used to observe the watched directory trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WatchMode {
    /// OS-native change notifications.
    #[default]
    Native,
    /// Periodic directory scans, for filesystems without native support
    /// (network mounts and similar).
    Polling,
}

impl WatchMode {
    /// Stable identifier used in logs and the settings API.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Native => "native",
            Self::Polling => "polling",
        }
    }
}

impl fmt::Display for WatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WatchMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "native" => Ok(Self::Native),
            "polling" => Ok(Self::Polling),
            other => Err(ConfigError::InvalidWatchMode {
                value: other.to_string(),
            }),
        }
    }
}

/// A single staging-to-library directory mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingPair {
    /// Staging root containing collection directories.
    pub source: PathBuf,
    /// Library root receiving classification buckets.
    pub destination: PathBuf,
}

/// Service settings, typically loaded from a TOML file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Master switch for the watch and sync machinery.
    pub enabled: bool,
    /// Emit notification events for completed operations.
    pub notify: bool,
    /// Run one full reconciliation at startup, then clear this flag.
    pub run_once: bool,
    /// Directory observation strategy.
    pub watch_mode: WatchMode,
    /// Mapping lines in `source:destination` form, one per line.
    pub mappings: String,
    /// Opaque cron expression advertised to external schedulers.
    pub schedule: Option<String>,
    /// HTTP listener port.
    pub http_port: u16,
    /// HTTP bind address.
    pub bind_addr: String,
    /// Scan interval for the polling watch mode, in seconds.
    pub poll_interval_secs: u64,
    /// Logging filter directive.
    pub log_level: Option<String>,
    /// Logging output format (`json` or `pretty`).
    pub log_format: Option<String>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            notify: false,
            run_once: false,
            watch_mode: WatchMode::default(),
            mappings: String::new(),
            schedule: None,
            http_port: DEFAULT_HTTP_PORT,
            bind_addr: "0.0.0.0".to_string(),
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            log_level: None,
            log_format: None,
        }
    }
}

impl SyncSettings {
    /// Parse the mapping block into structured pairs.
    ///
    /// Each non-empty line must contain a colon separating the staging root
    /// from the library root. Lines without a separator are skipped with a
    /// warning rather than failing the whole configuration.
    #[must_use]
    pub fn mapping_pairs(&self) -> Vec<MappingPair> {
        let mut pairs = Vec::new();
        for line in self.mappings.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match line.split_once(':') {
                Some((source, destination))
                    if !source.trim().is_empty() && !destination.trim().is_empty() =>
                {
                    pairs.push(MappingPair {
                        source: PathBuf::from(source.trim()),
                        destination: PathBuf::from(destination.trim()),
                    });
                }
                _ => {
                    warn!(line, "skipping malformed mapping line");
                }
            }
        }
        pairs
    }

    /// Validate settings that cannot be checked by deserialisation alone.
    ///
    /// # Errors
    ///
    /// Returns an error if the bind address does not parse, the polling
    /// interval is zero, or the service is enabled without any usable
    /// mapping.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bind_addr.parse::<IpAddr>().is_err() {
            return Err(ConfigError::InvalidBindAddr {
                value: self.bind_addr.clone(),
            });
        }
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::InvalidField {
                field: "poll_interval_secs",
                value: Some(self.poll_interval_secs.to_string()),
                reason: "must be at least one second",
            });
        }
        if self.enabled && self.mapping_pairs().is_empty() {
            return Err(ConfigError::InvalidField {
                field: "mappings",
                value: None,
                reason: "enabled service requires at least one mapping",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping_pairs_skip_malformed_lines() {
        let settings = SyncSettings {
            mappings: "/staging/a:/library/a\nnot-a-mapping\n\n/staging/b : /library/b\n"
                .to_string(),
            ..SyncSettings::default()
        };

        let pairs = settings.mapping_pairs();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].source, PathBuf::from("/staging/a"));
        assert_eq!(pairs[1].destination, PathBuf::from("/library/b"));
    }

    #[test]
    fn validate_rejects_enabled_without_mappings() {
        let settings = SyncSettings {
            enabled: true,
            ..SyncSettings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::InvalidField {
                field: "mappings",
                ..
            })
        ));
    }

    #[test]
    fn validate_rejects_bad_bind_addr() {
        let settings = SyncSettings {
            bind_addr: "not-an-ip".to_string(),
            ..SyncSettings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::InvalidBindAddr { .. })
        ));
    }

    #[test]
    fn watch_mode_round_trips() {
        assert_eq!("native".parse::<WatchMode>().ok(), Some(WatchMode::Native));
        assert_eq!(
            "polling".parse::<WatchMode>().ok(),
            Some(WatchMode::Polling)
        );
        assert!("inotify".parse::<WatchMode>().is_err());
        assert_eq!(WatchMode::Polling.to_string(), "polling");
    }
}
