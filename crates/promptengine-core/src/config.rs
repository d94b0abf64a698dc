use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Result, anyhow};

use crate::catalog::{Mode, ModelId};

/// Used when neither the CLI, the environment nor the config file names a server
pub const DEFAULT_API_BASE_URL: &str = "https://im-amrith-rag-engine-backend.hf.space";

/// Environment variable consulted before the config file
pub const API_URL_ENV: &str = "PROMPT_ENGINE_API_URL";

pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub api_base_url: Option<String>,
    pub default_model: Option<String>,
    pub default_mode: Option<String>,
    pub poll_interval_secs: u64,
    pub log_level: Option<String>,
    /// External speech-to-text command for voice input (see `voice`)
    pub voice_command: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            api_base_url: None,
            default_model: None,
            default_mode: None,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            log_level: None,
            voice_command: None,
        }
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(config_path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(config_path, config_content)?;
        Ok(())
    }

    pub fn save_default_model(model: ModelId) -> Result<()> {
        let mut config = Self::load().unwrap_or_else(|_| Self::new());
        config.default_model = Some(model.as_str().to_string());
        config.save()
    }

    pub fn save_default_mode(mode: Mode) -> Result<()> {
        let mut config = Self::load().unwrap_or_else(|_| Self::new());
        config.default_mode = Some(mode.as_str().to_string());
        config.save()
    }

    /// CLI override, then `PROMPT_ENGINE_API_URL`, then the config file, then the fallback
    pub fn resolve_base_url(&self, cli_override: Option<&str>) -> String {
        let env_value = std::env::var(API_URL_ENV).ok();
        let chosen = cli_override
            .map(str::to_string)
            .or(env_value)
            .or_else(|| self.api_base_url.clone())
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());

        chosen.trim().trim_end_matches('/').to_string()
    }

    pub fn model(&self) -> ModelId {
        self.default_model
            .as_deref()
            .and_then(ModelId::parse)
            .unwrap_or_default()
    }

    pub fn mode(&self) -> Mode {
        self.default_mode
            .as_deref()
            .and_then(Mode::parse)
            .unwrap_or_default()
    }

    pub fn poll_interval(&self) -> Duration {
        // A zero interval would spin the poller
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    /// `<config_dir>/promptengine`, home of the config, token store and log file
    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("promptengine"))
    }

    fn get_config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::new());
        assert_eq!(config.poll_interval(), Duration::from_secs(5));
        assert_eq!(config.model(), ModelId::Gemini25Flash);
        assert_eq!(config.mode(), Mode::Engineer);
    }

    #[test]
    fn save_then_load_keeps_fields() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::new();
        config.default_model = Some("gemini-1.5-pro".to_string());
        config.default_mode = Some("critic".to_string());
        config.poll_interval_secs = 9;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.model(), ModelId::Gemini15Pro);
        assert_eq!(loaded.mode(), Mode::Critic);
        assert_eq!(loaded.poll_interval_secs, 9);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"default_mode": "direct"}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.mode(), Mode::Direct);
        assert_eq!(config.poll_interval_secs, DEFAULT_POLL_INTERVAL_SECS);
    }

    #[test]
    fn unknown_labels_fall_back_to_defaults() {
        let mut config = Config::new();
        config.default_model = Some("gpt-4".to_string());
        config.default_mode = Some("poet".to_string());
        assert_eq!(config.model(), ModelId::default());
        assert_eq!(config.mode(), Mode::default());
    }

    #[test]
    fn zero_poll_interval_is_clamped() {
        let mut config = Config::new();
        config.poll_interval_secs = 0;
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
    }

    #[test]
    fn cli_override_wins_and_trailing_slash_is_trimmed() {
        let config = Config {
            api_base_url: Some("http://from-config".to_string()),
            ..Config::new()
        };
        assert_eq!(
            config.resolve_base_url(Some("http://localhost:8000/")),
            "http://localhost:8000"
        );
    }
}
