//! Loading settings from disk and the environment.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{ConfigError, ConfigResult};
use crate::model::SyncSettings;

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_ENV: &str = "MIRRA_CONFIG";

/// Default configuration file name, resolved against the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "mirra.toml";

/// Load and validate settings from the given TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read, parsed, or fails
/// validation.
pub fn load_settings(path: impl AsRef<Path>) -> ConfigResult<SyncSettings> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        operation: "read_config",
        path: path.to_path_buf(),
        source,
    })?;
    let settings: SyncSettings = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    settings.validate()?;
    info!(path = %path.display(), "loaded settings");
    Ok(settings)
}

/// Resolve the configuration path from `MIRRA_CONFIG`, falling back to the
/// default file name.
#[must_use]
pub fn config_path_from_env() -> PathBuf {
    std::env::var_os(CONFIG_PATH_ENV)
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from)
}

/// Load settings from the environment-selected path.
///
/// A missing default file yields the built-in defaults so the service can
/// start unconfigured; an explicitly named file must exist.
///
/// # Errors
///
/// Returns an error if an explicitly configured file is missing or any file
/// fails to parse or validate.
pub fn load_from_env() -> ConfigResult<SyncSettings> {
    let path = config_path_from_env();
    let explicit = std::env::var_os(CONFIG_PATH_ENV).is_some();
    if !explicit && !path.exists() {
        debug!(path = %path.display(), "no configuration file, using defaults");
        return Ok(SyncSettings::default());
    }
    load_settings(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn load_settings_parses_full_file() -> ConfigResult<()> {
        let dir = tempfile::tempdir().map_err(|source| ConfigError::Io {
            operation: "tempdir",
            path: PathBuf::new(),
            source,
        })?;
        let path = dir.path().join("mirra.toml");
        let mut file = std::fs::File::create(&path).map_err(|source| ConfigError::Io {
            operation: "create",
            path: path.clone(),
            source,
        })?;
        writeln!(
            file,
            r#"
enabled = true
notify = true
watch_mode = "polling"
mappings = """
/staging/a:/library/a
"""
schedule = "0 */6 * * *"
http_port = 9300
bind_addr = "127.0.0.1"
poll_interval_secs = 10
"#
        )
        .map_err(|source| ConfigError::Io {
            operation: "write",
            path: path.clone(),
            source,
        })?;

        let settings = load_settings(&path)?;
        assert!(settings.enabled);
        assert_eq!(settings.http_port, 9300);
        assert_eq!(settings.poll_interval_secs, 10);
        assert_eq!(settings.mapping_pairs().len(), 1);
        assert_eq!(settings.schedule.as_deref(), Some("0 */6 * * *"));
        Ok(())
    }

    #[test]
    fn load_settings_rejects_invalid_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("mirra.toml");
        std::fs::write(&path, "enabled = true\nmappings = \"\"\n").expect("write");
        assert!(matches!(
            load_settings(&path),
            Err(ConfigError::InvalidField { .. })
        ));
    }

    #[test]
    fn load_settings_surfaces_missing_file() {
        assert!(matches!(
            load_settings("/definitely/not/here/mirra.toml"),
            Err(ConfigError::Io { .. })
        ));
    }
}
