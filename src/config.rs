// SPDX-License-Identifier: GPL-3.0-only

use crate::backends::camera::types::{CameraSelection, CaptureBackendType};
use crate::constants::CapturePreset;
use crate::errors::{AppError, AppResult};
use crate::pipeline::CaptureConfiguration;
use crate::texture::TextureBackendType;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Directory name under the user's config and pictures directories
pub const APP_DIR: &str = "camtex";

const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Capture quality preset
    pub capture_preset: CapturePreset,
    /// Camera to capture from
    pub camera: CameraSelection,
    /// Capture provider to use
    pub backend: CaptureBackendType,
    /// Texture engine used by the stream command
    pub texture_backend: TextureBackendType,
    /// Where snapshots are written (None = pictures directory)
    pub snapshot_dir: Option<PathBuf>,
    /// `tracing` filter used when RUST_LOG is unset
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capture_preset: CapturePreset::default(),
            camera: CameraSelection::default(),
            backend: CaptureBackendType::default(),
            texture_backend: TextureBackendType::default(),
            snapshot_dir: None,
            log_filter: "warn,camtex=info".to_string(),
        }
    }
}

impl Config {
    /// Location of the config file
    pub fn path() -> AppResult<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
            .ok_or_else(|| AppError::Config("No user config directory".to_string()))
    }

    /// Load from the default location, falling back to defaults if absent
    pub fn load() -> AppResult<Self> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Invalid config file {}: {}", path.display(), e))
        })?;
        Ok(config)
    }

    pub fn save(&self) -> AppResult<PathBuf> {
        let path = Self::path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        info!(path = %path.display(), "Config saved");
        Ok(())
    }

    /// Immutable capture settings for a new pipeline
    pub fn capture_configuration(&self) -> CaptureConfiguration {
        CaptureConfiguration::new(self.capture_preset, self.camera.clone())
    }

    /// Snapshot directory, defaulting to ~/Pictures/camtex
    pub fn snapshot_dir(&self) -> PathBuf {
        self.snapshot_dir.clone().unwrap_or_else(|| {
            dirs::picture_dir()
                .or_else(dirs::home_dir)
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_DIR)
        })
    }
}
