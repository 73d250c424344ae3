//! Application configuration loaded from a TOML file.
//!
//! Every field has a default, so an empty or missing file yields a usable
//! configuration. Only a file that exists but fails to parse is an error.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::logging::DEFAULT_LOG_FILTER;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub window: WindowConfig,
    pub render: RenderConfig,
    pub pacing: PacingConfig,
    pub assets: AssetConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
    pub title: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            title: "vkframe".to_string(),
        }
    }
}

/// Present mode the swapchain tries first; FIFO is always the fallback.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PresentModePreference {
    #[default]
    Mailbox,
    Fifo,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RenderConfig {
    /// Requested number of presentable images.
    pub buffer_count: u32,
    /// Number of frame slots (F).
    pub frames_in_flight: usize,
    /// Upper bound for fence and acquire waits. Expiry is treated as device loss.
    pub fence_timeout_ms: u64,
    pub clear_color: [f32; 4],
    pub present_mode: PresentModePreference,
    pub validation: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            buffer_count: 3,
            frames_in_flight: 2,
            fence_timeout_ms: 5_000,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            present_mode: PresentModePreference::Mailbox,
            validation: cfg!(debug_assertions),
        }
    }
}

impl RenderConfig {
    pub fn fence_timeout(&self) -> Duration {
        Duration::from_millis(self.fence_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PacingConfig {
    /// Frames per second to pace the loop to. Zero disables pacing.
    pub target_fps: u32,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self { target_fps: 60 }
    }
}

impl PacingConfig {
    /// Target frame duration, or `None` when pacing is disabled.
    pub fn target_frame_time(&self) -> Option<Duration> {
        (self.target_fps > 0).then(|| Duration::from_secs_f64(1.0 / f64::from(self.target_fps)))
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct AssetConfig {
    /// Texture sampled by the quad. A generated checkerboard is used when unset.
    pub texture: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl AppConfig {
    /// Parse a configuration from TOML text and validate it.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)
            .map_err(|source| Error::ConfigParse { path: None, source })?;
        config.validate()?;
        Ok(config)
    }

    /// Load the configuration at `path`, falling back to defaults if the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                let config: Self = toml::from_str(&text).map_err(|source| Error::ConfigParse {
                    path: Some(path.to_path_buf()),
                    source,
                })?;
                config.validate()?;
                info!("Loaded configuration from {}", path.display());
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No configuration at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(source) => Err(Error::ConfigRead {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Reject values the renderer cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.render.frames_in_flight == 0 {
            return Err(Error::ConfigValue(
                "render.frames_in_flight must be at least 1".to_string(),
            ));
        }
        if self.render.buffer_count == 0 {
            return Err(Error::ConfigValue(
                "render.buffer_count must be at least 1".to_string(),
            ));
        }
        if self.render.fence_timeout_ms == 0 {
            return Err(Error::ConfigValue(
                "render.fence_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.window.width == 0 || self.window.height == 0 {
            return Err(Error::ConfigValue(format!(
                "window size must be nonzero, got {}x{}",
                self.window.width, self.window.height
            )));
        }
        Ok(())
    }
}
