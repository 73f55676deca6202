//! Selfie Core - Platform-free logic for the selfie video filter
//!
//! This crate provides the pieces of the filter that do not depend on a
//! renderer or a browser:
//! - Recording session state machine (chunks, intervals, artifacts)
//! - Model source handling, load tickets, framing and spin math
//! - Error taxonomy shared by every layer
//! - Runtime configuration

pub mod config;
pub mod error;
pub mod model;
pub mod recording;

pub use config::{CameraConfig, CameraMode, CaptureConfig, ConfigError, FilterConfig, ModelConfig};
pub use error::{AcquisitionError, AssetLoadError, CaptureError, FilterError};
pub use model::{Framing, LoadOutcome, LoadTicket, ModelLoadTracker, ModelSource, ModelStatus, Spin};
pub use recording::{
    Artifact, ArtifactRegistry, Chunk, ChunkRetention, IntervalId, MemoryRegistry, RecordingSession,
    RecordingState, Segment, SegmentOutcome,
};
