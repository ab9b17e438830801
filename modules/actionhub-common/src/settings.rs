use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ConfigError;

/// Operator-tunable settings, stored as TOML next to the event catalog.
/// Secrets (tokens) stay in env vars; see [`crate::Config`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Cooldown substituted for a command whose `timeout` is missing or bad.
    pub std_timeout_ms: u64,
    /// Points credited for one qualifying chat message.
    pub points_per_message: i64,
    /// Messages shorter than this earn nothing.
    pub min_message_len: usize,
    /// Points credited to the creator of each new clip.
    pub points_per_clip: i64,
    pub clip_check_interval_minutes: u64,
    pub clip_initial_delay_secs: u64,
    /// Delay before a dropped connection is re-established.
    pub reconnect_delay_secs: u64,
    /// Upper bound on a single scripted action. Unbounded when absent.
    pub action_timeout_ms: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            std_timeout_ms: 30_000,
            points_per_message: 2,
            min_message_len: 10,
            points_per_clip: 10,
            clip_check_interval_minutes: 15,
            clip_initial_delay_secs: 20,
            reconnect_delay_secs: 5,
            action_timeout_ms: None,
        }
    }
}

impl Settings {
    pub fn std_timeout(&self) -> Duration {
        Duration::from_millis(self.std_timeout_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }

    pub fn clip_check_interval(&self) -> Duration {
        Duration::from_secs(self.clip_check_interval_minutes * 60)
    }

    pub fn clip_initial_delay(&self) -> Duration {
        Duration::from_secs(self.clip_initial_delay_secs)
    }

    pub fn action_timeout(&self) -> Option<Duration> {
        self.action_timeout_ms.map(Duration::from_millis)
    }

    /// Parse settings from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load settings, writing a default file first if none exists yet.
    pub fn load_or_init(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            return Self::load(path);
        }

        warn!(path = %path.display(), "Settings file not found, writing defaults");
        let defaults = Self::default();
        defaults.save(path)?;
        Ok(defaults)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let body = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, body).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "Settings saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults_for_missing_fields() {
        let settings: Settings = toml::from_str("std_timeout_ms = 1000\n").unwrap();
        assert_eq!(settings.std_timeout_ms, 1000);
        assert_eq!(settings.points_per_message, 2);
        assert_eq!(settings.reconnect_delay(), Duration::from_secs(5));
        assert!(settings.action_timeout().is_none());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(toml::from_str::<Settings>("is_dark_mode = true\n").is_err());
    }

    #[test]
    fn load_or_init_writes_defaults_then_reads_them_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("configs").join("settings.toml");

        let first = Settings::load_or_init(&path).unwrap();
        assert!(path.exists());
        assert_eq!(first, Settings::default());

        std::fs::write(&path, "points_per_clip = 25\naction_timeout_ms = 1500\n").unwrap();
        let second = Settings::load_or_init(&path).unwrap();
        assert_eq!(second.points_per_clip, 25);
        assert_eq!(second.action_timeout(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "std_timeout_ms = \"soon\"\n").unwrap();
        assert!(matches!(
            Settings::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }
}
