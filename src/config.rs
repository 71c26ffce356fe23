// SPDX-License-Identifier: GPL-3.0-only

use crate::backends::camera::types::LensFacing;
use crate::constants::{DEFAULT_VIEWPORT_HEIGHT, DEFAULT_VIEWPORT_WIDTH, VIRTUAL_FRAME_INTERVAL};
use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Directory name under the user config dir
pub const CONFIG_DIR_NAME: &str = "camera-preview";

/// Config file name
pub const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Which camera to open
    pub lens_facing: LensFacing,
    /// Width of the preview surface
    pub viewport_width: u32,
    /// Height of the preview surface
    pub viewport_height: u32,
    /// Frame pacing of the virtual camera
    pub virtual_frame_interval_ms: u64,
    /// Default log filter when RUST_LOG is unset
    pub log_filter: String,
    /// Mirror the front camera preview (selfie mode)
    pub mirror_front_preview: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lens_facing: LensFacing::Back,
            viewport_width: DEFAULT_VIEWPORT_WIDTH,
            viewport_height: DEFAULT_VIEWPORT_HEIGHT,
            virtual_frame_interval_ms: VIRTUAL_FRAME_INTERVAL.as_millis() as u64,
            log_filter: "warn".to_string(),
            mirror_front_preview: true, // Default to mirrored (selfie mode)
        }
    }
}

impl Config {
    /// Path of the config file, if the platform has a config dir
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load from the default location; defaults when absent
    pub fn load() -> AppResult<Self> {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => {
                debug!("No config directory on this platform, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load from `path`; a missing file yields the defaults
    pub fn load_from(path: &Path) -> AppResult<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Config file not found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };

        let config: Self = serde_json::from_str(&contents).map_err(|e| {
            AppError::Config(format!("invalid config {}: {}", path.display(), e))
        })?;
        config.validate()?;

        info!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Save to the default location
    pub fn save(&self) -> AppResult<PathBuf> {
        let path = Self::config_path()
            .ok_or_else(|| AppError::Config("no config directory on this platform".into()))?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        debug!(path = %path.display(), "Saved config");
        Ok(())
    }

    pub fn virtual_frame_interval(&self) -> Duration {
        Duration::from_millis(self.virtual_frame_interval_ms)
    }

    fn validate(&self) -> AppResult<()> {
        if self.viewport_width == 0 || self.viewport_height == 0 {
            return Err(AppError::Config(format!(
                "viewport must be non-zero, got {}x{}",
                self.viewport_width, self.viewport_height
            )));
        }
        if self.virtual_frame_interval_ms == 0 {
            return Err(AppError::Config(
                "virtual_frame_interval_ms must be non-zero".into(),
            ));
        }
        Ok(())
    }
}
