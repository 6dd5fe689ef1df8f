use headframe_capture::SessionConfig;
use headframe_core::SurfaceSize;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// CLI configuration: defaults, then an optional TOML file, then
/// `HEADFRAME_*` environment variables. Command-line flags apply last.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Render surface width in pixels.
    pub surface_width: u32,
    /// Render surface height in pixels.
    pub surface_height: u32,
    /// Frames that may wait for the session before new ones are dropped.
    pub queue_depth: usize,
    /// Where captured snapshots are written.
    pub output_dir: PathBuf,
    /// How long to wait for completion after the last replayed frame.
    pub finish_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            surface_width: 640,
            surface_height: 480,
            queue_depth: 4,
            output_dir: PathBuf::from("snapshots"),
            finish_timeout_secs: 5,
        }
    }
}

impl Config {
    /// Load from `path` if given, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let base = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_toml(&text)?
            }
            None => Self::default(),
        };
        Ok(base.with_env())
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Overlay `HEADFRAME_*` environment variables.
    pub fn with_env(self) -> Self {
        self.with_vars(|key| std::env::var(key).ok())
    }

    fn with_vars(self, var: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            surface_width: parsed(&var, "HEADFRAME_SURFACE_WIDTH").unwrap_or(self.surface_width),
            surface_height: parsed(&var, "HEADFRAME_SURFACE_HEIGHT").unwrap_or(self.surface_height),
            queue_depth: parsed(&var, "HEADFRAME_QUEUE_DEPTH").unwrap_or(self.queue_depth),
            output_dir: var("HEADFRAME_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(self.output_dir),
            finish_timeout_secs: parsed(&var, "HEADFRAME_FINISH_TIMEOUT_SECS")
                .unwrap_or(self.finish_timeout_secs),
        }
    }

    pub fn surface(&self) -> SurfaceSize {
        SurfaceSize::new(self.surface_width, self.surface_height)
    }

    pub fn session(&self) -> SessionConfig {
        SessionConfig {
            surface: self.surface(),
            queue_depth: self.queue_depth,
        }
    }
}

fn parsed<T: std::str::FromStr>(var: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    var(key).and_then(|v| v.parse().ok())
}
