//! Configuration system for gifplug

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{GifError, Result};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Config {
    pub io: IoConfig,
    pub playback: PlaybackConfig,
    pub debug: DebugConfig,
}

/// Input acquisition settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct IoConfig {
    /// Memory-map files instead of reading them into the heap.
    /// Ignored on platforms without mmap.
    pub map_files: bool,
}

/// Host-side playback settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub looping: bool,
    /// Playback rate multiplier, clamped to `0.0..=MAX_SPEED`
    pub speed: f32,
}

/// Debug settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub log_level: LogLevel,
}

/// Logging level
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl PlaybackConfig {
    pub const MAX_SPEED: f32 = 10.0;

    /// Speed with out-of-range and NaN values pulled back into range
    pub fn clamped_speed(&self) -> f32 {
        if self.speed.is_nan() {
            return 1.0;
        }
        self.speed.clamp(0.0, Self::MAX_SPEED)
    }
}

// Default implementations

impl Default for IoConfig {
    fn default() -> Self {
        Self { map_files: true }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            looping: false,
            speed: 1.0,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default path, or create it if it doesn't exist
    pub fn load() -> Result<Self> {
        let path = Self::config_path();

        if path.exists() {
            Self::load_from(&path)
        } else {
            let config = Self::default();
            config.save()?;
            Ok(config)
        }
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| GifError::Config(e.to_string()))
    }

    /// Save configuration to the default path
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    /// Save configuration to an explicit file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content =
            toml::to_string_pretty(self).map_err(|e| GifError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the path to the configuration file
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gifplug")
            .join("config.toml")
    }
}
