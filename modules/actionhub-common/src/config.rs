use std::env;
use std::path::PathBuf;

use tracing::info;

const DEFAULT_SETTINGS_PATH: &str = "./configs/settings.toml";
const DEFAULT_EVENTS_PATH: &str = "./configs/events.toml";
const DEFAULT_STATE_PATH: &str = "./configs/state.toml";

/// Process configuration loaded from environment variables.
///
/// Platform credentials are optional: without them only local sources
/// (the console) can be connected.
#[derive(Debug, Clone)]
pub struct Config {
    // Platform identity
    pub login: Option<String>,
    pub access_token: Option<String>,
    pub broadcaster_id: Option<String>,

    // Files
    pub settings_path: PathBuf,
    pub events_path: PathBuf,
    /// Runtime state that must survive restarts (the clip watermark).
    pub state_path: PathBuf,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            login: optional_env("TWITCH_LOGIN"),
            access_token: optional_env("TWITCH_ACCESS_TOKEN"),
            broadcaster_id: optional_env("TWITCH_BROADCASTER_ID"),
            settings_path: env::var("ACTIONHUB_SETTINGS")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_SETTINGS_PATH)),
            events_path: env::var("ACTIONHUB_EVENTS")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_EVENTS_PATH)),
            state_path: env::var("ACTIONHUB_STATE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_STATE_PATH)),
        }
    }

    pub fn has_platform_credentials(&self) -> bool {
        self.login.is_some() && self.access_token.is_some()
    }

    /// Log the configuration with secrets reduced to presence flags.
    pub fn log_redacted(&self) {
        info!(
            login = self.login.as_deref().unwrap_or("<unset>"),
            access_token_set = self.access_token.is_some(),
            broadcaster_id = self.broadcaster_id.as_deref().unwrap_or("<unset>"),
            settings = %self.settings_path.display(),
            events = %self.events_path.display(),
            state = %self.state_path.display(),
            "Configuration loaded"
        );
    }
}

fn optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}
