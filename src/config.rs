// Capture configuration
//
// `CaptureSettings` is the editable, serializable form (persisted as TOML).
// `CaptureConfig` is the validated snapshot a session is created from; it is
// never modified while the session runs.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::capture::pacing::CatchUpPolicy;
use crate::encoding::{Preset, DEFAULT_QUEUE_LIMIT};

/// Smallest width or height a capture may have
pub const MIN_DIMENSION: u32 = 8;

/// Error type for configuration validation
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Frame rate must be a positive, finite number (got {0})")]
    InvalidFrameRate(f64),

    #[error("Capture name must not be empty")]
    EmptyName,

    #[error("Capture name must not contain path separators: {0}")]
    InvalidName(String),

    #[error("Catch-up burst limit must be at least 1")]
    InvalidBurst,
}

/// User-facing capture settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureSettings {
    /// Output width in pixels (floored to 8)
    #[serde(default = "default_width")]
    pub width: u32,

    /// Output height in pixels (floored to 8)
    #[serde(default = "default_height")]
    pub height: u32,

    /// Output codec/container preset
    #[serde(default)]
    pub preset: Preset,

    /// Output frame rate in frames per second
    #[serde(default = "default_frame_rate")]
    pub frame_rate: f64,

    /// Folder for output files; the working directory when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<PathBuf>,

    /// FFmpeg binary used for encoding
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// Frames allowed to stay queued in the encoder pipe after each frame
    #[serde(default = "default_queue_limit")]
    pub queue_limit: usize,

    /// Render layer reserved for the capture overlay
    #[serde(default = "default_overlay_layer")]
    pub overlay_layer: u8,

    /// What to do when rendering falls more than two frames behind
    #[serde(default)]
    pub catch_up: CatchUpPolicy,
}

/// Validated, immutable configuration for one capture session
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureConfig {
    pub width: u32,
    pub height: u32,
    pub frame_rate: f64,
    pub preset: Preset,
    /// Folder plus capture name, without the container suffix
    pub output_path_prefix: PathBuf,
    pub catch_up: CatchUpPolicy,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            preset: Preset::default(),
            frame_rate: default_frame_rate(),
            folder: None,
            ffmpeg_path: default_ffmpeg_path(),
            queue_limit: default_queue_limit(),
            overlay_layer: default_overlay_layer(),
            catch_up: CatchUpPolicy::default(),
        }
    }
}

impl CaptureSettings {
    /// Floor the dimensions to the minimum capture size
    pub fn clamp_dimensions(&mut self) {
        self.width = self.width.max(MIN_DIMENSION);
        self.height = self.height.max(MIN_DIMENSION);
    }

    /// Folder output files go to
    pub fn output_folder(&self) -> PathBuf {
        match &self.folder {
            Some(folder) if !folder.as_os_str().is_empty() => folder.clone(),
            _ => PathBuf::from("."),
        }
    }

    /// Validate the settings for a capture named `name`
    ///
    /// Dimensions are floored rather than rejected; everything else that would
    /// make a session meaningless is an error.
    pub fn validate(&self, name: &str) -> Result<CaptureConfig, ConfigError> {
        if !self.frame_rate.is_finite() || self.frame_rate <= 0.0 {
            return Err(ConfigError::InvalidFrameRate(self.frame_rate));
        }

        let name = name.trim();
        if name.is_empty() {
            return Err(ConfigError::EmptyName);
        }
        if name.contains(['/', '\\']) {
            return Err(ConfigError::InvalidName(name.to_string()));
        }

        if let CatchUpPolicy::Duplicate { max_burst: 0 } = self.catch_up {
            return Err(ConfigError::InvalidBurst);
        }

        Ok(CaptureConfig {
            width: self.width.max(MIN_DIMENSION),
            height: self.height.max(MIN_DIMENSION),
            frame_rate: self.frame_rate,
            preset: self.preset,
            output_path_prefix: self.output_folder().join(name),
            catch_up: self.catch_up,
        })
    }

    /// Load settings from disk or return defaults
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(contents) => match toml::from_str::<CaptureSettings>(&contents) {
                    Ok(mut settings) => {
                        settings.clamp_dimensions();
                        return settings;
                    }
                    Err(e) => {
                        log::warn!("Failed to parse config {}: {}", path.display(), e);
                    }
                },
                Err(e) => {
                    log::warn!("Failed to read config file {}: {}", path.display(), e);
                }
            }
        }

        Self::default()
    }

    /// Save settings to disk
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;

        Ok(())
    }
}

/// Get the default config file path
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("framepace")
        .join("config.toml")
}

fn default_width() -> u32 {
    1920
}

fn default_height() -> u32 {
    1080
}

fn default_frame_rate() -> f64 {
    60.0
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_queue_limit() -> usize {
    DEFAULT_QUEUE_LIMIT
}

/// Layer 5 is the conventional UI layer
fn default_overlay_layer() -> u8 {
    5
}
