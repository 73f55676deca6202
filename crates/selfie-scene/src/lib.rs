//! Selfie Scene - Bevy composition of the selfie video filter
//!
//! This crate wires the four parts of the filter into one Bevy app:
//! the camera plane (live webcam texture), the model presenter (spinning
//! glTF model), the scene host (viewer camera rig, lights, render surface)
//! and the capture controller (recording state machine). Platform code
//! plugs in through the traits in [`backend`].

pub mod backend;
pub mod camera;
pub mod capture;
pub mod controls;
pub mod host;
pub mod models;
pub mod plane;

use bevy::prelude::*;
use selfie_core::FilterConfig;

/// Active filter configuration
#[derive(Debug, Clone, Resource)]
pub struct FilterSettings(pub FilterConfig);

/// Plugin that sets up the whole filter scene
pub struct SelfieScenePlugin {
    pub config: FilterConfig,
}

impl Plugin for SelfieScenePlugin {
    fn build(&self, app: &mut App) {
        let config = &self.config;

        app.insert_resource(FilterSettings(config.clone()))
            .insert_resource(camera::CameraRig::new(&config.camera))
            .insert_resource(models::ModelPresenter::new(&config.model))
            .insert_resource(capture::CaptureController::new(&config.capture))
            .insert_resource(controls::ControlView::default())
            .add_plugins(camera::CameraPlugin)
            .add_plugins(host::SceneHostPlugin)
            .add_plugins(plane::CameraPlanePlugin)
            .add_plugins(models::ModelsPlugin)
            .add_plugins(capture::CapturePlugin)
            .add_plugins(controls::ControlsPlugin);
    }
}

// Re-export commonly used types
pub use backend::{
    ArtifactBackend, CameraBackend, EncoderBackend, EncoderEvent, EncoderRequest, FeedStatus,
    FrameSource, MediaEncoder, VideoFrame,
};
pub use camera::{CameraRig, MainCamera};
pub use capture::{CaptureCommand, CaptureController};
pub use controls::{ControlEvent, ControlView};
pub use host::CompositedSurface;
pub use models::{ModelPresenter, PresentedModel, ReloadModel};
pub use plane::{CameraFeed, CameraPlane};
