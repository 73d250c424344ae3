//! Core utilities shared by the vkframe crates.
//!
//! This crate provides foundational types used across the workspace:
//! - Error types and result aliases
//! - Logging initialization
//! - Timer utilities
//! - Configuration loading
//! - Frame pacing

mod config;
mod error;
mod logging;
mod pacing;
mod timer;

pub use config::{
    AppConfig, AssetConfig, LogConfig, PacingConfig, PresentModePreference, RenderConfig,
    WindowConfig,
};
pub use error::{Error, Result};
pub use logging::{DEFAULT_LOG_FILTER, init_logging};
pub use pacing::FramePacer;
pub use timer::{MAX_FRAME_DELTA, Timer};
