//! Bevy application setup

use bevy::prelude::*;
use selfie_core::FilterConfig;
use selfie_scene::{CompositedSurface, SelfieScenePlugin};

/// Canvas the scene renders into and the recorder captures
pub const CANVAS_SELECTOR: &str = "#selfie-canvas";

/// Run the Bevy application
pub fn run(config: FilterConfig) {
    tracing::info!(
        "Starting selfie filter (model: {:?}, {} fps)",
        config.model.default_url,
        config.capture.fps
    );

    let mut app = App::new();
    app.add_plugins(
        DefaultPlugins
            .set(WindowPlugin {
                primary_window: Some(Window {
                    title: "Selfie Video Filter".to_string(),
                    canvas: Some(CANVAS_SELECTOR.to_string()),
                    fit_canvas_to_parent: true,
                    prevent_default_event_handling: false,
                    ..default()
                }),
                ..default()
            })
            .set(AssetPlugin {
                // Load assets relative to the page (host serves /models directly)
                file_path: "".to_string(),
                // Don't look for .meta files - server doesn't have them
                meta_check: bevy::asset::AssetMetaCheck::Never,
                ..default()
            }),
    )
    .insert_resource(CompositedSurface::new(Some(CANVAS_SELECTOR.to_string())));

    install_backends(&mut app);

    app.add_plugins(SelfieScenePlugin { config }).run();
}

#[cfg(target_arch = "wasm32")]
fn install_backends(app: &mut App) {
    use crate::artifact::ObjectUrlRegistry;
    use crate::dom::DomControlsPlugin;
    use crate::recorder::CanvasRecorder;
    use crate::webcam::Webcam;
    use selfie_scene::{ArtifactBackend, CameraBackend, EncoderBackend};

    app.insert_non_send_resource(CameraBackend::new(Webcam::new()))
        .insert_non_send_resource(EncoderBackend::new(CanvasRecorder::new()))
        .insert_non_send_resource(ArtifactBackend::new(ObjectUrlRegistry::new()))
        .add_plugins(DomControlsPlugin);
}

// Native builds have no camera or recorder; the scene runs without them
#[cfg(not(target_arch = "wasm32"))]
fn install_backends(app: &mut App) {
    use selfie_core::MemoryRegistry;
    use selfie_scene::ArtifactBackend;

    app.insert_non_send_resource(ArtifactBackend::new(MemoryRegistry::new()));
}
