use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Result, anyhow};

use crate::client::{ClientSettings, DEFAULT_MODEL, DEFAULT_TEMPERATURE};
use crate::session::SessionOptions;

/// Environment variables checked for the API key, in priority order.
pub const API_KEY_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub surface_refine_errors: Option<bool>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    pub fn save_api_key(key: &str) -> Result<()> {
        let mut config = Self::load().unwrap_or_else(|_| Self::new());
        config.api_key = Some(key.to_string());
        config.save()
    }

    /// Where the API key would come from: "env", "config", or None.
    pub fn key_source(&self) -> Option<&'static str> {
        if env_api_key().is_some() {
            Some("env")
        } else if self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty()) {
            Some("config")
        } else {
            None
        }
    }

    /// Client settings with environment variables taking precedence over the file.
    pub fn client_settings(&self) -> ClientSettings {
        self.client_settings_with(env_api_key())
    }

    fn client_settings_with(&self, env_key: Option<String>) -> ClientSettings {
        ClientSettings {
            api_key: env_key.or_else(|| self.api_key.clone()),
            model: self.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            temperature: self.temperature.unwrap_or(DEFAULT_TEMPERATURE),
        }
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            surface_refine_errors: self
                .surface_refine_errors
                .unwrap_or(SessionOptions::default().surface_refine_errors),
        }
    }

    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("threadcraft"))
    }

    fn get_config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }
}

fn env_api_key() -> Option<String> {
    API_KEY_VARS
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|key| !key.trim().is_empty())
}
