//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/syncroom/config.toml)
//! 3. Environment variables (SYNCROOM_* prefix)
//!
//! Environment variables take precedence over config file values.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable prefix
const ENV_PREFIX: &str = "SYNCROOM";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory for durable session state
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Relay server WebSocket URL
    #[serde(default = "default_relay_url")]
    pub relay_url: String,

    /// Loopback address the control channel listens on
    #[serde(default = "default_control_addr")]
    pub control_addr: String,

    /// Keep-alive tick interval in seconds
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u64,

    /// First reconnect delay in milliseconds
    #[serde(default = "default_reconnect_initial_ms")]
    pub reconnect_initial_ms: u64,

    /// Upper bound for the reconnect delay in seconds
    #[serde(default = "default_reconnect_max_secs")]
    pub reconnect_max_secs: u64,

    /// Write daemon logs here instead of stderr
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            relay_url: default_relay_url(),
            control_addr: default_control_addr(),
            keepalive_secs: default_keepalive_secs(),
            reconnect_initial_ms: default_reconnect_initial_ms(),
            reconnect_max_secs: default_reconnect_max_secs(),
            log_file: None,
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (SYNCROOM_DATA_DIR, SYNCROOM_RELAY_URL, ...)
    /// 2. Config file (~/.config/syncroom/config.toml or SYNCROOM_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration, preferring a path given on the command line
    pub fn load_with_cli_override(path: Option<&PathBuf>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config.ensure_data_dir()?;
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var(format!("{}_DATA_DIR", ENV_PREFIX)) {
            self.data_dir = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var(format!("{}_RELAY_URL", ENV_PREFIX)) {
            if !val.is_empty() {
                self.relay_url = val;
            }
        }

        if let Ok(val) = std::env::var(format!("{}_CONTROL_ADDR", ENV_PREFIX)) {
            if !val.is_empty() {
                self.control_addr = val;
            }
        }

        // Unparseable values are ignored rather than failing startup
        if let Ok(val) = std::env::var(format!("{}_KEEPALIVE_SECS", ENV_PREFIX)) {
            if let Ok(secs) = val.parse() {
                self.keepalive_secs = secs;
            }
        }
    }

    /// Ensure data directory exists
    fn ensure_data_dir(&self) -> Result<()> {
        if !self.data_dir.exists() {
            std::fs::create_dir_all(&self.data_dir)
                .with_context(|| format!("Failed to create data directory: {:?}", self.data_dir))?;
        }
        Ok(())
    }

    /// Save configuration to the default file
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_file_path())
    }

    /// Save configuration to a specific file
    pub fn save_to_path(&self, config_path: &PathBuf) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with SYNCROOM_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("syncroom")
            .join("config.toml")
    }

    /// Get the path to the persisted session file
    pub fn session_path(&self) -> PathBuf {
        self.data_dir.join("session.json")
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive_secs.max(1))
    }

    pub fn reconnect_initial_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_initial_ms.max(1))
    }

    pub fn reconnect_max_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_max_secs.max(1))
    }

    /// WebSocket URL clients use to reach the control channel
    pub fn control_url(&self) -> String {
        format!("ws://{}", self.control_addr)
    }
}

/// Get the default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("syncroom")
}

fn default_relay_url() -> String {
    "ws://localhost:3000".to_string()
}

fn default_control_addr() -> String {
    "127.0.0.1:47800".to_string()
}

fn default_keepalive_secs() -> u64 {
    20
}

fn default_reconnect_initial_ms() -> u64 {
    1000
}

fn default_reconnect_max_secs() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to serialize tests that touch environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Guard that locks env access and saves/restores env vars
    struct EnvGuard<'a> {
        _lock: std::sync::MutexGuard<'a, ()>,
        saved: Vec<(String, Option<String>)>,
    }

    impl<'a> EnvGuard<'a> {
        fn new(vars: &[&str]) -> Self {
            let lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
            let saved = vars
                .iter()
                .map(|&name| (name.to_string(), env::var(name).ok()))
                .collect();
            for name in vars {
                env::remove_var(name);
            }
            Self { _lock: lock, saved }
        }
    }

    impl Drop for EnvGuard<'_> {
        fn drop(&mut self) {
            for (name, value) in &self.saved {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }

    const ENV_VARS: &[&str] = &[
        "SYNCROOM_DATA_DIR",
        "SYNCROOM_RELAY_URL",
        "SYNCROOM_CONTROL_ADDR",
        "SYNCROOM_KEEPALIVE_SECS",
    ];

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.relay_url, "ws://localhost:3000");
        assert_eq!(config.control_addr, "127.0.0.1:47800");
        assert_eq!(config.keepalive_interval(), Duration::from_secs(20));
        assert!(config.data_dir.ends_with("syncroom"));
        assert!(config.log_file.is_none());
    }

    #[test]
    fn test_file_paths() {
        let config = Config::default();
        assert!(config.session_path().ends_with("session.json"));
        assert_eq!(config.control_url(), "ws://127.0.0.1:47800");
    }

    #[test]
    fn test_reconnect_delays() {
        let config = Config::default();
        assert_eq!(config.reconnect_initial_delay(), Duration::from_secs(1));
        assert_eq!(config.reconnect_max_delay(), Duration::from_secs(30));
    }

    #[test]
    fn test_env_override_data_dir() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("SYNCROOM_DATA_DIR", "/tmp/syncroom-test");
        config.apply_env_overrides();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/syncroom-test"));
    }

    #[test]
    fn test_env_override_relay_url() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("SYNCROOM_RELAY_URL", "wss://relay.example.com");
        config.apply_env_overrides();
        assert_eq!(config.relay_url, "wss://relay.example.com");

        // Empty string keeps the previous value
        env::set_var("SYNCROOM_RELAY_URL", "");
        config.apply_env_overrides();
        assert_eq!(config.relay_url, "wss://relay.example.com");
    }

    #[test]
    fn test_env_override_keepalive() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("SYNCROOM_KEEPALIVE_SECS", "5");
        config.apply_env_overrides();
        assert_eq!(config.keepalive_secs, 5);

        env::set_var("SYNCROOM_KEEPALIVE_SECS", "soon");
        config.apply_env_overrides();
        assert_eq!(config.keepalive_secs, 5);
    }

    #[test]
    fn test_serialization() {
        let _guard = EnvGuard::new(ENV_VARS);

        let config = Config {
            data_dir: PathBuf::from("/data/syncroom"),
            relay_url: "ws://relay.example.com".to_string(),
            control_addr: "127.0.0.1:9000".to_string(),
            keepalive_secs: 15,
            reconnect_initial_ms: 250,
            reconnect_max_secs: 10,
            log_file: Some(PathBuf::from("/tmp/syncroom.log")),
        };

        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("relay_url"));
        assert!(toml_str.contains("control_addr"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.data_dir, config.data_dir);
        assert_eq!(parsed.relay_url, config.relay_url);
        assert_eq!(parsed.keepalive_secs, 15);
        assert_eq!(parsed.log_file, config.log_file);
    }

    #[test]
    fn test_load_from_str_fills_defaults() {
        let _guard = EnvGuard::new(ENV_VARS);

        let toml = r#"
            data_dir = "/custom/data"
            relay_url = "ws://example.com"
        "#;

        let config = Config::load_from_str(toml).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/custom/data"));
        assert_eq!(config.relay_url, "ws://example.com");
        assert_eq!(config.control_addr, "127.0.0.1:47800");
        assert_eq!(config.reconnect_max_secs, 30);
    }

    #[test]
    fn test_load_from_path_missing_file() {
        let _guard = EnvGuard::new(ENV_VARS);
        let temp_dir = tempfile::TempDir::new().unwrap();
        env::set_var("SYNCROOM_DATA_DIR", temp_dir.path());

        let path = PathBuf::from("/nonexistent/config.toml");
        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.relay_url, "ws://localhost:3000");
        assert_eq!(config.data_dir, temp_dir.path());
    }

    #[test]
    fn test_save_to_path_round_trip() {
        let _guard = EnvGuard::new(ENV_VARS);
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.data_dir = temp_dir.path().join("data");
        config.relay_url = "ws://saved.example.com".to_string();
        config.save_to_path(&path).unwrap();

        let loaded = Config::load_from_path(&path).unwrap();
        assert_eq!(loaded.relay_url, "ws://saved.example.com");
        assert!(loaded.data_dir.exists());
    }
}
