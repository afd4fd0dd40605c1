//! Client configuration, loaded from `~/.config/pengu/config.toml`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// REST base URL, e.g. `http://localhost:4000/api`.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Push channel URL. Derived from `base_url` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events_url: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            events_url: None,
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:4000/api".to_string()
}

impl Config {
    /// Load configuration from the default location, honoring a
    /// `PENGU_CONFIG` override. A default file is written on first run.
    pub fn load() -> Result<Self> {
        if let Ok(custom_path) = std::env::var("PENGU_CONFIG") {
            return Self::load_from(&PathBuf::from(custom_path));
        }
        let home_dir = dirs::home_dir().context("Could not determine home directory")?;
        let config_dir = home_dir.join(".config").join("pengu");
        let config_path = config_dir.join("config.toml");
        if !config_path.exists() {
            fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
            let default_config = Self::default();
            let toml_str = toml::to_string_pretty(&default_config)
                .context("Failed to serialize default config")?;
            fs::write(&config_path, toml_str).context("Failed to write default config file")?;
            return Ok(default_config);
        }
        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Push channel URL: the configured one, else the REST base rewritten to
    /// the websocket scheme with `/events` appended.
    pub fn events_url(&self) -> String {
        if let Some(ref url) = self.api.events_url {
            return url.clone();
        }
        let mut ws_url = self
            .api
            .base_url
            .replace("http://", "ws://")
            .replace("https://", "wss://");
        if !ws_url.ends_with("/events") {
            if !ws_url.ends_with('/') {
                ws_url.push('/');
            }
            ws_url.push_str("events");
        }
        ws_url
    }
}
