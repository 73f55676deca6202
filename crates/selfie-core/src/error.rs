//! Error taxonomy for the filter
//!
//! Three failure classes exist: camera acquisition, model asset loading,
//! and capture. The first two degrade the scene gracefully, capture
//! failures stop the recording. All of them are reported to the user.

use thiserror::Error;

/// Camera permission or device failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AcquisitionError {
    #[error("Camera permission denied: {0}")]
    PermissionDenied(String),
    #[error("No camera device found: {0}")]
    NoDevice(String),
    #[error("Camera is in use or unreadable: {0}")]
    DeviceBusy(String),
    #[error("Camera capture is not supported here: {0}")]
    Unsupported(String),
    #[error("Camera error: {0}")]
    Other(String),
}

impl AcquisitionError {
    /// Map a browser `DOMException` name onto the taxonomy
    pub fn from_dom_name(name: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        match name {
            "NotAllowedError" | "SecurityError" | "PermissionDeniedError" => {
                Self::PermissionDenied(message)
            }
            "NotFoundError" | "OverconstrainedError" | "DevicesNotFoundError" => {
                Self::NoDevice(message)
            }
            "NotReadableError" | "TrackStartError" | "AbortError" => Self::DeviceBusy(message),
            "TypeError" | "NotSupportedError" => Self::Unsupported(message),
            _ => Self::Other(format!("{}: {}", name, message)),
        }
    }
}

/// Model asset could not be turned into a renderable scene
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssetLoadError {
    #[error("Model source is empty")]
    EmptySource,
    #[error("Failed to load model {url}: {reason}")]
    LoadFailed { url: String, reason: String },
    #[error("Model {0} contains no scenes")]
    NoScene(String),
}

/// Recording could not be started, continued, or published
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("Render surface is not available")]
    NoSurface,
    #[error("A recording is already in progress")]
    AlreadyRecording,
    #[error("No recording is in progress")]
    NotRecording,
    #[error("Encoder does not support {0}")]
    UnsupportedMime(String),
    #[error("Encoder failed: {0}")]
    Encoder(String),
    #[error("Failed to publish recording: {0}")]
    Publish(String),
}

/// Any failure the filter can report
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),
    #[error(transparent)]
    AssetLoad(#[from] AssetLoadError),
    #[error(transparent)]
    Capture(#[from] CaptureError),
}

impl FilterError {
    /// Short category label used in the controls and in log fields
    pub fn category(&self) -> &'static str {
        match self {
            Self::Acquisition(_) => "camera",
            Self::AssetLoad(_) => "model",
            Self::Capture(_) => "recording",
        }
    }
}
