//! Errors raised outside the Vulkan layer: windowing and configuration.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("window error: {0}")]
    Window(String),

    /// Surface creation or the instance extensions it needs.
    #[error("surface error: {0}")]
    Surface(String),

    #[error("failed to read {}: {source}", .path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed TOML or an unknown key. `path` is `None` for in-memory text.
    #[error("invalid configuration{}: {source}", location(.path))]
    ConfigParse {
        path: Option<PathBuf>,
        #[source]
        source: toml::de::Error,
    },

    /// A value that parses but cannot be rendered with.
    #[error("invalid configuration: {0}")]
    ConfigValue(String),
}

impl Error {
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Error::ConfigRead { .. } | Error::ConfigParse { .. } | Error::ConfigValue(_)
        )
    }
}

fn location(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| format!(" in {}", p.display()))
        .unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, Error>;
