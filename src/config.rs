//! Application configuration management.
//!
//! Configuration is stored at `~/.config/recipeshelf/config.json`; the
//! credential store lives under the data directory. The identity API key can
//! come from the config file or the `RECIPESHELF_API_KEY` environment
//! variable, with the environment taking precedence.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Application name used for config/data directory paths
const APP_NAME: &str = "recipeshelf";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable overriding the configured API key
const API_KEY_ENV: &str = "RECIPESHELF_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub api_key: Option<String>,
    /// Override for the identity endpoint base URL (emulators, self-hosting).
    pub identity_url: Option<String>,
    pub last_email: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory holding the persisted credential.
    pub fn data_dir() -> Result<PathBuf> {
        let data_dir =
            dirs::data_dir().ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    /// API key for the identity endpoint, environment first.
    pub fn resolved_api_key(&self) -> Result<String> {
        std::env::var(API_KEY_ENV)
            .ok()
            .or_else(|| self.api_key.clone())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "No identity API key configured (set {} or api_key in config.json)",
                    API_KEY_ENV
                )
            })
    }
}
