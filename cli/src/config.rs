// Configuration management for the onionrelay CLI
//
// Cross-platform config stored in:
// - macOS: ~/Library/Application Support/onionrelay/config.json
// - Linux: ~/.config/onionrelay/config.json
// - Windows: %APPDATA%\onionrelay\config.json

use anyhow::{Context, Result};
use onionrelay_core::topology::{
    DEFAULT_BASE_RELAY_PORT, DEFAULT_BASE_USER_PORT, DEFAULT_REGISTRY_PORT,
};
use onionrelay_core::Topology;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Host every node listens on and dials
    pub host: String,

    /// Port of the node registry
    pub registry_port: u16,

    /// Relay N listens on `base_relay_port + N`
    pub base_relay_port: u16,

    /// User N listens on `base_user_port + N`
    pub base_user_port: u16,

    /// Timeout for every outgoing HTTP request, in seconds
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            registry_port: DEFAULT_REGISTRY_PORT,
            base_relay_port: DEFAULT_BASE_RELAY_PORT,
            base_user_port: DEFAULT_BASE_USER_PORT,
            request_timeout_secs: 10,
        }
    }
}

impl Config {
    /// Get the config directory path (cross-platform)
    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to determine config directory")?
            .join("onionrelay");

        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;

        Ok(config_dir)
    }

    /// Get the config file path
    pub fn config_file() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// Load config from the default location, creating it if missing
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path).context("Failed to read config file")?;
            let config: Config =
                serde_json::from_str(&contents).context("Failed to parse config file")?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, contents).context("Failed to write config file")?;
        Ok(())
    }

    /// Set a config value. Does not persist; call `save` afterwards.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "host" => {
                if value.is_empty() {
                    anyhow::bail!("Host must not be empty");
                }
                self.host = value.to_string();
            }
            "registry_port" => {
                self.registry_port = value.parse().context("Invalid port number")?;
            }
            "base_relay_port" => {
                self.base_relay_port = value.parse().context("Invalid port number")?;
            }
            "base_user_port" => {
                self.base_user_port = value.parse().context("Invalid port number")?;
            }
            "request_timeout_secs" => {
                self.request_timeout_secs = value.parse().context("Invalid number")?;
            }
            _ => anyhow::bail!("Unknown config key: {}", key),
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "host" => Some(self.host.clone()),
            "registry_port" => Some(self.registry_port.to_string()),
            "base_relay_port" => Some(self.base_relay_port.to_string()),
            "base_user_port" => Some(self.base_user_port.to_string()),
            "request_timeout_secs" => Some(self.request_timeout_secs.to_string()),
            _ => None,
        }
    }

    pub fn list(&self) -> Vec<(String, String)> {
        vec![
            ("host".to_string(), self.host.clone()),
            ("registry_port".to_string(), self.registry_port.to_string()),
            ("base_relay_port".to_string(), self.base_relay_port.to_string()),
            ("base_user_port".to_string(), self.base_user_port.to_string()),
            (
                "request_timeout_secs".to_string(),
                format!("{}s", self.request_timeout_secs),
            ),
        ]
    }

    pub fn topology(&self) -> Topology {
        Topology {
            registry_port: self.registry_port,
            base_relay_port: self.base_relay_port,
            base_user_port: self.base_user_port,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
