//! Control surface - user intents in, a render-agnostic view out
//!
//! The widgets live outside the rendered canvas so they never end up in a
//! recording. The platform layer forwards widget input as [`ControlEvent`]s
//! and redraws its widgets whenever [`ControlView`] changes.

use bevy::prelude::*;
use chrono::Utc;
use selfie_core::{CameraMode, FilterError, ModelStatus, RecordingState};

use crate::backend::FeedStatus;
use crate::camera::CameraRig;
use crate::capture::{CaptureCommand, CaptureController};
use crate::models::{ModelPresenter, ReloadModel};
use crate::plane::CameraFeed;

pub const HEADING: &str = "Selfie Video Filter";
pub const MODEL_URL_LABEL: &str = "3D Model URL (GLB file)";
pub const MODEL_URL_PLACEHOLDER: &str = "Enter GLB file URL";
pub const START_LABEL: &str = "Start Recording";
pub const STOP_LABEL: &str = "Stop Recording";
pub const DOWNLOAD_LABEL: &str = "Download Video";

/// Input from the control widgets
#[derive(Message, Debug, Clone, PartialEq, Eq)]
pub enum ControlEvent {
    /// The model URL field was committed (enter or focus loss)
    ModelUrlCommitted(String),
    ToggleRecording,
    Download,
    SetCameraMode(CameraMode),
}

/// Everything the widgets display
#[derive(Debug, Clone, PartialEq, Default, Resource)]
pub struct ControlView {
    pub model_url: String,
    pub model_status: String,
    pub camera_status: String,
    pub camera_mode: CameraMode,
    pub recording: bool,
    pub record_label: &'static str,
    /// Elapsed recording time as `mm:ss`
    pub elapsed: Option<String>,
    /// The encoder is still flushing a stopped recording
    pub finalizing: bool,
    pub download_url: Option<String>,
    pub file_name: String,
    /// One `(category, message)` line per failing part
    pub errors: Vec<(&'static str, String)>,
}

/// Plugin for the control surface
pub struct ControlsPlugin;

impl Plugin for ControlsPlugin {
    fn build(&self, app: &mut App) {
        app.add_message::<ControlEvent>()
            .add_systems(Startup, init_control_view)
            .add_systems(PreUpdate, route_control_events)
            .add_systems(PostUpdate, refresh_control_view);
    }
}

fn init_control_view(presenter: Res<ModelPresenter>, mut view: ResMut<ControlView>) {
    view.model_url = presenter.initial_source().trim().to_string();
    view.record_label = START_LABEL;
}

fn route_control_events(
    mut events: MessageReader<ControlEvent>,
    mut view: ResMut<ControlView>,
    presenter: Res<ModelPresenter>,
    mut rig: ResMut<CameraRig>,
    mut reloads: MessageWriter<ReloadModel>,
    mut capture: MessageWriter<CaptureCommand>,
) {
    for event in events.read() {
        match event {
            ControlEvent::ModelUrlCommitted(url) => {
                let url = url.trim();
                let retry = matches!(presenter.status(), ModelStatus::Failed { .. });
                if url == view.model_url && !retry {
                    continue;
                }
                view.model_url = url.to_string();
                reloads.write(ReloadModel(url.to_string()));
            }
            ControlEvent::ToggleRecording => {
                capture.write(CaptureCommand::Toggle);
            }
            ControlEvent::Download => {
                capture.write(CaptureCommand::Download);
            }
            ControlEvent::SetCameraMode(mode) => rig.set_mode(*mode),
        }
    }
}

fn format_elapsed(elapsed: chrono::Duration) -> String {
    let secs = elapsed.num_seconds().max(0);
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

fn refresh_control_view(
    mut view: ResMut<ControlView>,
    presenter: Res<ModelPresenter>,
    controller: Res<CaptureController>,
    feed: Option<Res<CameraFeed>>,
    rig: Res<CameraRig>,
) {
    let session = &controller.session;
    let recording = session.state() == RecordingState::Recording;
    let mut errors = Vec::new();

    let model_status = match presenter.status() {
        ModelStatus::Absent => "No model".to_string(),
        ModelStatus::Loading(source) => format!("Loading {}", source),
        ModelStatus::Ready(source) => format!("Showing {}", source),
        ModelStatus::Failed { error, .. } => {
            let error = FilterError::from(error.clone());
            errors.push((error.category(), error.to_string()));
            "Model failed to load".to_string()
        }
    };

    let camera_status = match feed.as_deref().map(|feed| &feed.status) {
        None | Some(FeedStatus::Pending) => "Waiting for camera".to_string(),
        Some(FeedStatus::Live { width, height }) => format!("Camera {}x{}", width, height),
        Some(FeedStatus::Failed(err)) => {
            let error = FilterError::from(err.clone());
            errors.push((error.category(), error.to_string()));
            "Camera unavailable".to_string()
        }
    };

    if let Some(err) = session.last_error() {
        let error = FilterError::from(err.clone());
        errors.push((error.category(), error.to_string()));
    }

    let next = ControlView {
        model_url: view.model_url.clone(),
        model_status,
        camera_status,
        camera_mode: rig.mode(),
        recording,
        record_label: if recording { STOP_LABEL } else { START_LABEL },
        elapsed: session.elapsed(Utc::now()).map(format_elapsed),
        finalizing: session.is_finalizing(),
        download_url: session.artifact_url().map(str::to_string),
        file_name: session.file_name().to_string(),
        errors,
    };
    view.set_if_neq(next);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::CapturePlugin;
    use crate::host::CompositedSurface;
    use selfie_core::{CaptureConfig, CameraConfig, CaptureError, ModelConfig};

    fn controls_app(default_url: &str) -> App {
        let mut app = App::new();
        app.add_plugins(MinimalPlugins)
            .insert_resource(ModelPresenter::new(&ModelConfig {
                default_url: default_url.to_string(),
                ..ModelConfig::default()
            }))
            .insert_resource(CameraRig::new(&CameraConfig::default()))
            .insert_resource(CaptureController::new(&CaptureConfig::default()))
            .insert_resource(CompositedSurface::new(None))
            .insert_resource(ControlView::default())
            .add_message::<ReloadModel>()
            .add_plugins((CapturePlugin, ControlsPlugin));
        app
    }

    fn reload_requests(app: &mut App) -> Vec<ReloadModel> {
        app.world_mut()
            .resource_mut::<Messages<ReloadModel>>()
            .drain()
            .collect()
    }

    #[test]
    fn test_initial_view() {
        let mut app = controls_app("models/a.glb");
        app.update();

        let view = app.world().resource::<ControlView>();
        assert_eq!(view.model_url, "models/a.glb");
        assert_eq!(view.record_label, START_LABEL);
        assert!(!view.recording);
        assert!(view.download_url.is_none());
        assert_eq!(view.file_name, "filtered_video.webm");
        assert_eq!(view.camera_mode, CameraMode::Pinned);
        assert_eq!(view.model_status, "No model");
    }

    #[test]
    fn test_commit_only_reloads_on_change() {
        let mut app = controls_app("models/a.glb");
        app.update();
        reload_requests(&mut app);

        app.world_mut()
            .write_message(ControlEvent::ModelUrlCommitted(" models/a.glb ".to_string()));
        app.update();
        assert!(reload_requests(&mut app).is_empty());

        app.world_mut()
            .write_message(ControlEvent::ModelUrlCommitted("models/b.glb".to_string()));
        app.update();
        assert_eq!(
            reload_requests(&mut app),
            vec![ReloadModel("models/b.glb".to_string())]
        );
        assert_eq!(app.world().resource::<ControlView>().model_url, "models/b.glb");
    }

    #[test]
    fn test_padded_config_url_does_not_reload_on_commit() {
        let mut app = controls_app("  models/a.glb \n");
        app.update();
        reload_requests(&mut app);
        assert_eq!(app.world().resource::<ControlView>().model_url, "models/a.glb");

        app.world_mut()
            .write_message(ControlEvent::ModelUrlCommitted("models/a.glb".to_string()));
        app.update();
        assert!(reload_requests(&mut app).is_empty());
    }

    #[test]
    fn test_camera_mode_switch() {
        let mut app = controls_app("");
        app.update();

        app.world_mut()
            .write_message(ControlEvent::SetCameraMode(CameraMode::Orbit));
        app.update();

        assert_eq!(app.world().resource::<CameraRig>().mode(), CameraMode::Orbit);
        assert_eq!(
            app.world().resource::<ControlView>().camera_mode,
            CameraMode::Orbit
        );
    }

    #[test]
    fn test_recording_error_is_shown() {
        let mut app = controls_app("");
        app.update();

        // Headless: no surface, so the start is refused
        app.world_mut().write_message(ControlEvent::ToggleRecording);
        app.update();
        app.update();

        let view = app.world().resource::<ControlView>();
        assert!(!view.recording);
        assert_eq!(
            view.errors,
            vec![("recording", CaptureError::NoSurface.to_string())]
        );
    }

    #[test]
    fn test_elapsed_format() {
        assert_eq!(format_elapsed(chrono::Duration::seconds(0)), "00:00");
        assert_eq!(format_elapsed(chrono::Duration::seconds(75)), "01:15");
        assert_eq!(format_elapsed(chrono::Duration::seconds(-3)), "00:00");
    }
}
