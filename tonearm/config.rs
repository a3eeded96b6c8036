use crate::error::App;
use crate::player::{FacadeOptions, Volume};
use log::info;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// Daemon settings read from `~/.config/tonearm/config.toml`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct Config {
    pub log_level: String,
    pub default_volume: u8,
    pub position_interval_ms: u64,
    /// Zero disables the divergence warning.
    pub confirm_warn_after_ms: u64,
    /// File name looked up under `audio/` next to the executable when `open`
    /// is issued without a path.
    pub fallback_track: String,
    pub audio_extensions: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            default_volume: 50,
            position_interval_ms: 200,
            confirm_warn_after_ms: 5000,
            fallback_track: "sample.mp3".to_string(),
            audio_extensions: vec!["mp3".to_string(), "flac".to_string(), "wav".to_string()],
        }
    }
}

impl Config {
    pub async fn load_from_file(file_path: &Path) -> Result<Self, App> {
        let content = fs::read_to_string(file_path).await?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Loads the config, writing the defaults first if the file is missing or empty.
    pub async fn load_or_create(file_path: &Path) -> Result<Self, App> {
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let exists = fs::try_exists(file_path).await?;
        if exists && !fs::read_to_string(file_path).await?.trim().is_empty() {
            return Self::load_from_file(file_path).await;
        }

        let config = Config::default();
        fs::write(file_path, toml::to_string_pretty(&config)?).await?;
        info!("Wrote default config to {}", file_path.display());
        Ok(config)
    }

    /// Never zero; the position ticker cannot run with an empty period.
    pub fn position_interval(&self) -> Duration {
        Duration::from_millis(self.position_interval_ms.max(10))
    }
}

impl From<&Config> for FacadeOptions {
    fn from(config: &Config) -> Self {
        Self {
            initial_volume: Volume::new(config.default_volume),
            confirm_warn_after: (config.confirm_warn_after_ms > 0)
                .then(|| Duration::from_millis(config.confirm_warn_after_ms)),
        }
    }
}

/// Root of all per-user state: `$HOME/.config/tonearm`.
pub fn config_dir() -> Result<PathBuf, App> {
    let home_dir = std::env::var("HOME")?;
    Ok(PathBuf::from(home_dir).join(".config").join("tonearm"))
}

pub fn config_file() -> Result<PathBuf, App> {
    Ok(config_dir()?.join("config.toml"))
}

pub fn log_dir() -> Result<PathBuf, App> {
    Ok(config_dir()?.join("logs"))
}
