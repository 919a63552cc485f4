//! Configuration management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub game: GameConfig,
}

/// Listener and asset settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind
    pub host: String,

    /// TCP port to bind
    pub port: u16,

    /// Directory served under `/static`
    pub static_dir: PathBuf,

    /// Directory holding `index.html`
    pub templates_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            static_dir: PathBuf::from("static"),
            templates_dir: PathBuf::from("templates"),
        }
    }
}

/// Game session settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Drop a connection after this many seconds without inbound traffic; unset disables
    pub idle_timeout_secs: Option<u64>,

    /// Longest accepted session identifier
    pub max_session_id_len: usize,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: None,
            max_session_id_len: 64,
        }
    }
}

impl GameConfig {
    /// Idle timeout as a duration; zero counts as disabled
    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_secs
            .filter(|&secs| secs > 0)
            .map(Duration::from_secs)
    }

    /// Session ids must be non-empty and no longer than `max_session_id_len`
    pub fn is_valid_session_id(&self, id: &str) -> bool {
        !id.is_empty() && id.len() <= self.max_session_id_len
    }
}

impl Config {
    /// Load config from file, or return defaults if not found
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Config::default())
        }
    }

    /// Load config from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {:?}", path))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Invalid config {:?}", path))?;
        Ok(config)
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("noughts")
            .join("config.toml")
    }

    /// `host:port` to bind
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.bind_addr(), "0.0.0.0:8000");
        assert_eq!(config.game.idle_timeout(), None);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nport = 9100\n\n[game]\nidle_timeout_secs = 30").unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.game.idle_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.game.max_session_id_len, 64);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nport = \"not a port\"").unwrap();

        let err = Config::load_from(file.path()).unwrap_err();
        assert!(err.to_string().contains("Invalid config"));
    }

    #[test]
    fn test_zero_idle_timeout_disables() {
        let game = GameConfig {
            idle_timeout_secs: Some(0),
            ..GameConfig::default()
        };
        assert_eq!(game.idle_timeout(), None);
    }

    #[test]
    fn test_session_id_validation() {
        let game = GameConfig::default();
        assert!(game.is_valid_session_id("abc"));
        assert!(!game.is_valid_session_id(""));
        assert!(!game.is_valid_session_id(&"x".repeat(65)));
    }
}
