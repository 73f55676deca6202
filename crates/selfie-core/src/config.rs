//! Runtime configuration for the filter
//!
//! The host reads it from TOML and serves it as JSON; the browser app
//! applies URL query overrides on top.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

use crate::recording::ChunkRetention;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),
    #[error("Invalid JSON config: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Invalid config value: {0}")]
    Invalid(String),
}

/// Complete filter configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model loaded on startup (blank for none)
    #[serde(default = "default_model_url")]
    pub default_url: String,
    /// Uniform scale applied to every model
    #[serde(default = "default_scale")]
    pub scale: f32,
    /// Vertical offset applied to every model
    #[serde(default = "default_offset_y")]
    pub offset_y: f32,
    /// Rotation about the vertical axis per rendered frame, in radians
    #[serde(default = "default_spin")]
    pub spin_per_frame: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            default_url: default_model_url(),
            scale: default_scale(),
            offset_y: default_offset_y(),
            spin_per_frame: default_spin(),
        }
    }
}

fn default_model_url() -> String {
    "models/aespa_short_hair_with_bones.glb".to_string()
}

fn default_scale() -> f32 {
    0.1
}

fn default_offset_y() -> f32 {
    -0.5
}

fn default_spin() -> f32 {
    0.01
}

/// Who drives the viewer camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraMode {
    /// Camera held at a fixed distance in front of the plane
    #[default]
    Pinned,
    /// Interactive orbit around the scene
    Orbit,
}

impl std::str::FromStr for CameraMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pinned" | "pin" => Ok(Self::Pinned),
            "orbit" => Ok(Self::Orbit),
            other => Err(ConfigError::Invalid(format!("unknown camera mode '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Distance of the pinned viewer camera from the origin
    #[serde(default = "default_pin_distance")]
    pub pin_distance: f32,
    /// Camera plane width in world units
    #[serde(default = "default_plane_width")]
    pub plane_width: f32,
    /// Camera plane height in world units
    #[serde(default = "default_plane_height")]
    pub plane_height: f32,
    /// Initial camera mode
    #[serde(default)]
    pub mode: CameraMode,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            pin_distance: default_pin_distance(),
            plane_width: default_plane_width(),
            plane_height: default_plane_height(),
            mode: CameraMode::default(),
        }
    }
}

fn default_pin_distance() -> f32 {
    5.0
}

fn default_plane_width() -> f32 {
    16.0
}

fn default_plane_height() -> f32 {
    9.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Frame rate requested from the canvas capture stream
    #[serde(default = "default_fps")]
    pub fps: u32,
    /// Container/codec requested from the encoder
    #[serde(default = "default_mime_type")]
    pub mime_type: String,
    /// Download file name for the artifact
    #[serde(default = "default_file_name")]
    pub file_name: String,
    /// Segment interval in milliseconds (None: one segment at stop)
    #[serde(default = "default_timeslice")]
    pub timeslice_ms: Option<u32>,
    /// Whether chunks reset on every start
    #[serde(default)]
    pub retention: ChunkRetention,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            fps: default_fps(),
            mime_type: default_mime_type(),
            file_name: default_file_name(),
            timeslice_ms: default_timeslice(),
            retention: ChunkRetention::default(),
        }
    }
}

fn default_fps() -> u32 {
    30
}

fn default_mime_type() -> String {
    "video/webm".to_string()
}

fn default_file_name() -> String {
    "filtered_video.webm".to_string()
}

fn default_timeslice() -> Option<u32> {
    Some(1000)
}

/// Finite and strictly greater than zero (rejects NaN and infinity)
fn is_positive(value: f32) -> bool {
    value.is_finite() && value > 0.0
}

impl FilterConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: FilterConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        info!(path = %path.display(), "Loaded filter configuration");
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Parse and validate the JSON form served by the host
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let config: FilterConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `key=value` overrides (already URL-decoded).
    ///
    /// Recognized keys: `model`, `fps`, `camera`, `retention`. Others are ignored.
    pub fn apply_overrides<'a, I>(&mut self, pairs: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        for (key, value) in pairs {
            match key {
                "model" => self.model.default_url = value.trim().to_string(),
                "fps" => {
                    self.capture.fps = value
                        .parse()
                        .map_err(|_| ConfigError::Invalid(format!("fps '{}' is not a number", value)))?;
                }
                "camera" => self.camera.mode = value.parse()?,
                "retention" => {
                    self.capture.retention = match value {
                        "per_interval" => ChunkRetention::PerInterval,
                        "cumulative" => ChunkRetention::Cumulative,
                        other => {
                            return Err(ConfigError::Invalid(format!(
                                "unknown retention '{}'",
                                other
                            )))
                        }
                    };
                }
                _ => {
                    debug!(key, "Ignoring unknown config override");
                    continue;
                }
            }
            debug!(key, value, "Applied config override");
        }
        self.validate()
    }

    /// Reject values the filter cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capture.fps == 0 {
            return Err(ConfigError::Invalid("capture.fps must be positive".to_string()));
        }
        if self.capture.file_name.trim().is_empty() {
            return Err(ConfigError::Invalid("capture.file_name is empty".to_string()));
        }
        if self.capture.mime_type.trim().is_empty() {
            return Err(ConfigError::Invalid("capture.mime_type is empty".to_string()));
        }
        if !is_positive(self.model.scale) {
            return Err(ConfigError::Invalid("model.scale must be positive".to_string()));
        }
        if !self.model.offset_y.is_finite() || !self.model.spin_per_frame.is_finite() {
            return Err(ConfigError::Invalid("model offsets must be finite".to_string()));
        }
        if !is_positive(self.camera.pin_distance) {
            return Err(ConfigError::Invalid("camera.pin_distance must be positive".to_string()));
        }
        if !is_positive(self.camera.plane_width) || !is_positive(self.camera.plane_height) {
            return Err(ConfigError::Invalid("camera plane size must be positive".to_string()));
        }
        Ok(())
    }
}
