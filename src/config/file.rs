//! Configuration file management for micnote.
//!
//! This module handles loading and saving application configuration from TOML files.
//! Configuration is stored in the user's config directory and written with defaults
//! on first run.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::recording::encoding::DEFAULT_PREFERENCES;

/// Microphone and encoding configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecordingConfig {
    /// Audio device to use. Options:
    /// - "default" for system default device
    /// - numeric index (0, 1, 2, etc.) from `micnote list-devices`
    /// - device name from `micnote list-devices`
    #[serde(default = "default_device")]
    pub device: String,
    /// Media types to try, best first
    #[serde(default = "default_preferred_encodings")]
    pub preferred_encodings: Vec<String>,
    /// Indicator redraws per second while recording
    #[serde(default = "default_frame_rate")]
    pub frame_rate: u32,
}

fn default_device() -> String {
    "default".to_string()
}

fn default_preferred_encodings() -> Vec<String> {
    DEFAULT_PREFERENCES.iter().map(|s| s.to_string()).collect()
}

fn default_frame_rate() -> u32 {
    60
}

/// Highest indicator refresh rate honoured; faster settings are capped.
pub const MAX_FRAME_RATE: u32 = 240;

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
            preferred_encodings: default_preferred_encodings(),
            frame_rate: default_frame_rate(),
        }
    }
}

impl RecordingConfig {
    /// Time between indicator frames, with the rate clamped to `1..=MAX_FRAME_RATE`.
    pub fn frame_interval(&self) -> Duration {
        let rate = self.frame_rate.clamp(1, MAX_FRAME_RATE);
        Duration::from_secs_f64(1.0 / f64::from(rate))
    }
}

/// Where finished clips are handed off.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadConfig {
    /// Directory the chat client picks attachments up from
    #[serde(default = "default_attachment_dir")]
    pub attachment_dir: PathBuf,
    /// Put the clip's file URI on the clipboard after writing it
    #[serde(default = "default_true")]
    pub copy_to_clipboard: bool,
}

fn default_attachment_dir() -> PathBuf {
    std::env::temp_dir().join("micnote")
}

fn default_true() -> bool {
    true
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            attachment_dir: default_attachment_dir(),
            copy_to_clipboard: true,
        }
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MicnoteConfig {
    #[serde(default)]
    pub recording: RecordingConfig,
    #[serde(default)]
    pub upload: UploadConfig,
}

impl MicnoteConfig {
    /// Loads configuration from the user's config directory.
    ///
    /// # Errors
    /// - If the config directory cannot be determined
    /// - If the config file cannot be read
    /// - If the TOML is malformed
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&get_config_path()?)
    }

    /// Loads configuration, writing the defaults first if no file exists yet.
    ///
    /// The attachment directory is created as well so the first recording has
    /// somewhere to land.
    pub fn load_or_create() -> anyhow::Result<Self> {
        let config_path = get_config_path()?;
        let config = if config_path.exists() {
            Self::load_from(&config_path)?
        } else {
            tracing::info!("No config found, writing defaults to {}", config_path.display());
            let config = Self::default();
            config.save_to(&config_path)?;
            config
        };

        if let Err(e) = fs::create_dir_all(&config.upload.attachment_dir) {
            tracing::warn!(
                "Could not create attachment directory {}: {e}",
                config.upload.attachment_dir.display()
            );
        }
        Ok(config)
    }

    fn load_from(path: &Path) -> anyhow::Result<Self> {
        let config_content = fs::read_to_string(path)?;
        let config: MicnoteConfig = toml::from_str(&config_content)?;
        Ok(config)
    }

    fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        let config_content = toml::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }
}

/// Retrieves the path to the config file, creating its directory if needed.
///
/// # Errors
/// - If the config directory cannot be determined
/// - If the config directory cannot be created
pub fn get_config_path() -> Result<PathBuf, std::io::Error> {
    let home = dirs::home_dir().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Could not find home directory",
        )
    })?;
    let config_dir = home.join(".config").join("micnote");
    fs::create_dir_all(&config_dir)?;

    Ok(config_dir.join("micnote.toml"))
}
