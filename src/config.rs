use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use serde_with::{DurationSeconds, serde_as};
use tracing::debug;

use crate::diagnosis::DEFAULT_DIAGNOSIS_TIMEOUT;
use crate::error::ConfigError;
use crate::hw::DEFAULT_SCAN_WINDOW;
use crate::notification::DEFAULT_NOTIFICATION_TTL;
use crate::session::DEFAULT_FIX_DELAY;

const SETTINGS_FILE_NAME: &str = "settings.json";
const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5000";
const DEFAULT_LANGUAGE: &str = "en";

/// Persisted defaults; every field can be overridden on the command line.
#[serde_as]
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server_url: String,
    #[serde_as(as = "DurationSeconds<u64>")]
    pub diagnosis_timeout: Duration,
    #[serde_as(as = "DurationSeconds<u64>")]
    pub scan_window: Duration,
    #[serde_as(as = "DurationSeconds<u64>")]
    pub fix_delay: Duration,
    #[serde_as(as = "DurationSeconds<u64>")]
    pub notification_ttl: Duration,
    pub language: String,
    /// Only devices whose advertised name starts with this are picked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_prefix: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            diagnosis_timeout: DEFAULT_DIAGNOSIS_TIMEOUT,
            scan_window: DEFAULT_SCAN_WINDOW,
            fix_delay: DEFAULT_FIX_DELAY,
            notification_ttl: DEFAULT_NOTIFICATION_TTL,
            language: DEFAULT_LANGUAGE.to_string(),
            name_prefix: None,
        }
    }
}

/// Locates and reads `settings.json`.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    /// Uses `path_override` when given, else the platform config directory.
    #[must_use]
    pub fn new(path_override: Option<PathBuf>) -> Self {
        Self {
            path: path_override.unwrap_or_else(default_settings_path),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the settings file. A missing file yields [`Settings::default`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the file exists but cannot be read,
    /// and [`ConfigError::Parse`] when it is not valid settings JSON.
    pub fn load(&self) -> Result<Settings, ConfigError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no settings file, using defaults");
                return Ok(Settings::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: self.path.display().to_string(),
                    source,
                });
            }
        };

        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: self.path.display().to_string(),
            source,
        })
    }
}

fn default_settings_path() -> PathBuf {
    let Some(project_dirs) = ProjectDirs::from("dev", "btfix", "btfix") else {
        return std::env::temp_dir().join("btfix").join(SETTINGS_FILE_NAME);
    };
    project_dirs.config_dir().join(SETTINGS_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use std::time::{SystemTime, UNIX_EPOCH};

    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    use super::*;

    fn unique_temp_path(name: &str) -> PathBuf {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time should be after unix epoch")
            .as_nanos();
        std::env::temp_dir().join(format!("btfix-{name}-{suffix}.json"))
    }

    #[test]
    fn missing_file_yields_defaults() -> anyhow::Result<()> {
        let store = SettingsStore::new(Some(unique_temp_path("missing")));

        let settings = store.load()?;

        assert_eq!(Settings::default(), settings);
        assert_eq!(Duration::from_secs(10), settings.diagnosis_timeout);
        assert_eq!(Duration::from_secs(2), settings.fix_delay);
        Ok(())
    }

    #[test]
    fn partial_file_keeps_defaults_for_absent_fields() -> anyhow::Result<()> {
        let path = unique_temp_path("partial");
        fs::write(
            &path,
            r#"{"server_url": "http://diag.local:8080", "diagnosis_timeout": 3}"#,
        )?;

        let settings = SettingsStore::new(Some(path.clone())).load();
        fs::remove_file(&path)?;

        let settings = settings?;
        assert_eq!("http://diag.local:8080", settings.server_url);
        assert_eq!(Duration::from_secs(3), settings.diagnosis_timeout);
        assert_eq!("en", settings.language);
        Ok(())
    }

    #[test]
    fn malformed_file_is_a_parse_error() -> anyhow::Result<()> {
        let path = unique_temp_path("malformed");
        fs::write(&path, "{ not json")?;

        let result = SettingsStore::new(Some(path.clone())).load();
        fs::remove_file(&path)?;

        assert_matches!(result, Err(ConfigError::Parse { .. }));
        Ok(())
    }

    #[test]
    fn durations_serialise_as_whole_seconds() -> anyhow::Result<()> {
        let json = serde_json::to_value(Settings::default())?;

        assert_eq!(Some(5), json["notification_ttl"].as_u64());
        assert_eq!(Some(10), json["diagnosis_timeout"].as_u64());
        Ok(())
    }
}
