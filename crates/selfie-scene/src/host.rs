//! Scene host - viewer camera, lights and the composited render surface

use bevy::prelude::*;
use tracing::debug;
use bevy::window::PrimaryWindow;

use crate::camera::{CameraRig, MainCamera};

/// The surface the scene renders into, and what the encoder captures
#[derive(Debug, Clone, Resource)]
pub struct CompositedSurface {
    /// DOM selector of the canvas (None on native windows)
    pub canvas: Option<String>,
    /// Whether a primary window exists to capture from
    pub ready: bool,
}

impl CompositedSurface {
    pub fn new(canvas: Option<String>) -> Self {
        Self {
            canvas,
            ready: false,
        }
    }
}

/// Plugin for the camera, lights and surface tracking
pub struct SceneHostPlugin;

impl Plugin for SceneHostPlugin {
    fn build(&self, app: &mut App) {
        if !app.world().contains_resource::<CompositedSurface>() {
            app.insert_resource(CompositedSurface::new(None));
        }
        app.insert_resource(ClearColor(Color::BLACK))
            .add_systems(Startup, setup_scene)
            .add_systems(PreUpdate, track_surface);
    }
}

fn setup_scene(mut commands: Commands, rig: Res<CameraRig>) {
    commands.spawn((
        Camera3d::default(),
        Projection::Perspective(PerspectiveProjection {
            near: 0.1,
            far: 1000.0,
            ..default()
        }),
        rig.pose(),
        MainCamera,
    ));

    // Key light from the viewer's side, slightly above
    commands.spawn((
        DirectionalLight {
            illuminance: 5000.0,
            shadows_enabled: false,
            ..default()
        },
        Transform::from_xyz(2.0, 4.0, 6.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));

    commands.insert_resource(AmbientLight {
        color: Color::WHITE,
        brightness: 300.0,
        ..default()
    });
}

fn track_surface(
    windows: Query<(), With<PrimaryWindow>>,
    mut surface: ResMut<CompositedSurface>,
) {
    let ready = windows.single().is_ok();
    if surface.ready != ready {
        debug!(ready, "Render surface availability changed");
        surface.ready = ready;
    }
}
