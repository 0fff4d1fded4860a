use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const APP_DIR_NAME: &str = "spotify-widget";

pub const MIN_POLL_INTERVAL_MS: u64 = 1000;
pub const MAX_POLL_INTERVAL_MS: u64 = 5000;

/// Scopes requested during the implicit grant
pub const SCOPES: [&str; 3] = [
    "user-read-playback-state",
    "user-modify-playback-state",
    "user-read-currently-playing",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub client_id: String,
    pub redirect_uri: String,
    pub poll_interval_ms: u64,
    pub api_base_url: String,
    pub authorize_url: String,
    pub request_timeout_ms: u64,
    /// Ask the service to resume playback when it reports a paused track
    pub resume_when_paused: bool,
    pub launch_at_login: bool,
    /// Overrides the location of the persisted token/track file
    pub state_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            redirect_uri: "http://localhost:5173/callback".to_string(),
            poll_interval_ms: MAX_POLL_INTERVAL_MS,
            api_base_url: "https://api.spotify.com/v1".to_string(),
            authorize_url: "https://accounts.spotify.com/authorize".to_string(),
            request_timeout_ms: 4000,
            resume_when_paused: false,
            launch_at_login: true,
            state_file: None,
        }
    }
}

impl Config {
    /// Load `config.toml` if present, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read {}", config_path.display()))?;
            Self::from_toml_str(&content)
                .with_context(|| format!("Failed to parse {}", config_path.display()))?
        } else {
            log::info!("No config file at {}, using defaults", config_path.display());
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        config.poll_interval_ms = clamp_poll_interval(config.poll_interval_ms);
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    /// Environment variables win over the file, mirroring how the widget is usually deployed.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(client_id) = lookup("SPOTIFY_CLIENT_ID") {
            self.client_id = client_id;
        }
        if let Some(redirect_uri) = lookup("SPOTIFY_REDIRECT_URI") {
            self.redirect_uri = redirect_uri;
        }
        if let Some(raw) = lookup("SPOTIFY_POLL_INTERVAL_MS") {
            match raw.trim().parse() {
                Ok(ms) => self.poll_interval_ms = ms,
                Err(_) => log::warn!("Ignoring invalid SPOTIFY_POLL_INTERVAL_MS={:?}", raw),
            }
        }
    }

    /// A login needs a client id; polling an already-held token does not.
    pub fn validate_for_login(&self) -> Result<()> {
        if self.client_id.trim().is_empty() {
            anyhow::bail!("client_id is not configured (set SPOTIFY_CLIENT_ID or config.toml)");
        }
        if self.redirect_uri.trim().is_empty() {
            anyhow::bail!("redirect_uri is not configured");
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(clamp_poll_interval(self.poll_interval_ms))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn config_path() -> PathBuf {
        config_dir().join("config.toml")
    }

    pub fn state_path(&self) -> PathBuf {
        self.state_file
            .clone()
            .unwrap_or_else(|| data_dir().join("state.json"))
    }
}

fn clamp_poll_interval(ms: u64) -> u64 {
    let clamped = ms.clamp(MIN_POLL_INTERVAL_MS, MAX_POLL_INTERVAL_MS);
    if clamped != ms {
        log::warn!(
            "Poll interval {}ms outside {}..={}ms, using {}ms",
            ms,
            MIN_POLL_INTERVAL_MS,
            MAX_POLL_INTERVAL_MS,
            clamped
        );
    }
    clamped
}

fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.poll_interval_ms, 5000);
        assert!(config.api_base_url.starts_with("https://"));
        assert!(!config.resume_when_paused);
        assert!(config.validate_for_login().is_err());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = Config::from_toml_str("client_id = \"abc\"\npoll_interval_ms = 2000\n").unwrap();
        assert_eq!(config.client_id, "abc");
        assert_eq!(config.poll_interval(), Duration::from_millis(2000));
        assert_eq!(config.redirect_uri, "http://localhost:5173/callback");
        assert!(config.validate_for_login().is_ok());
    }

    #[test]
    fn poll_interval_is_clamped() {
        let mut config = Config::default();
        config.poll_interval_ms = 100;
        assert_eq!(config.poll_interval(), Duration::from_millis(1000));
        config.poll_interval_ms = 60_000;
        assert_eq!(config.poll_interval(), Duration::from_millis(5000));
    }

    #[test]
    fn environment_overrides_file_values() {
        let mut config = Config::from_toml_str("client_id = \"from-file\"").unwrap();
        config.apply_overrides(|key| match key {
            "SPOTIFY_CLIENT_ID" => Some("from-env".to_string()),
            "SPOTIFY_POLL_INTERVAL_MS" => Some("not a number".to_string()),
            _ => None,
        });
        assert_eq!(config.client_id, "from-env");
        assert_eq!(config.poll_interval_ms, 5000);
    }
}
