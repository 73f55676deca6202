//! Viewer camera: pinned in front of the camera plane, or orbiting
//!
//! Exactly one mode drives the camera at a time. `apply_camera_rig` is the
//! only system that writes the camera transform, and it runs after input
//! handling, so the pinned pose always wins at the end of the frame.

use bevy::input::mouse::{MouseMotion, MouseWheel};
use bevy::prelude::*;
use tracing::info;
use selfie_core::{CameraConfig, CameraMode};

/// Marker component for the main camera
#[derive(Component)]
pub struct MainCamera;

/// Orbit controller state (Y-up spherical coordinates around `target`)
#[derive(Debug, Clone, PartialEq)]
pub struct OrbitState {
    pub distance: f32,
    pub target_distance: f32,
    pub azimuth: f32,
    pub elevation: f32,
    pub target: Vec3,
    pub target_focus: Vec3,
    pub sensitivity: f32,
    pub zoom_speed: f32,
    pub smooth_factor: f32,
}

impl OrbitState {
    /// Orbit pose that coincides with the pinned pose at `distance`
    fn facing_plane(distance: f32) -> Self {
        Self {
            distance,
            target_distance: distance,
            azimuth: 0.0,
            elevation: 0.0,
            target: Vec3::ZERO,
            target_focus: Vec3::ZERO,
            sensitivity: 0.005,
            zoom_speed: 0.1,
            smooth_factor: 0.15,
        }
    }

    /// Camera position for the current angles and distance
    pub fn eye(&self) -> Vec3 {
        let x = self.distance * self.elevation.cos() * self.azimuth.sin();
        let y = self.distance * self.elevation.sin();
        let z = self.distance * self.elevation.cos() * self.azimuth.cos();
        self.target + Vec3::new(x, y, z)
    }

    fn rotate(&mut self, delta: Vec2) {
        self.azimuth -= delta.x * self.sensitivity;
        self.elevation = (self.elevation + delta.y * self.sensitivity).clamp(-1.5, 1.5);
    }

    fn zoom(&mut self, factor: f32, max_distance: f32) {
        self.target_distance = (self.target_distance * factor).clamp(0.5, max_distance);
    }

    fn smooth(&mut self, dt: f32) {
        let lerp_factor = 1.0 - (-self.smooth_factor * 60.0 * dt).exp();
        self.distance += (self.target_distance - self.distance) * lerp_factor;
        self.target += (self.target_focus - self.target) * lerp_factor;
    }
}

/// Who drives the viewer camera, and where
#[derive(Debug, Clone, Resource)]
pub struct CameraRig {
    mode: CameraMode,
    pin_distance: f32,
    pub orbit: OrbitState,
}

impl CameraRig {
    pub fn new(config: &CameraConfig) -> Self {
        Self {
            mode: config.mode,
            pin_distance: config.pin_distance,
            orbit: OrbitState::facing_plane(config.pin_distance),
        }
    }

    pub fn mode(&self) -> CameraMode {
        self.mode
    }

    pub fn pin_distance(&self) -> f32 {
        self.pin_distance
    }

    /// Switch modes. Entering orbit starts from the pinned pose.
    pub fn set_mode(&mut self, mode: CameraMode) {
        if mode == self.mode {
            return;
        }
        if mode == CameraMode::Orbit {
            self.orbit = OrbitState::facing_plane(self.pin_distance);
        }
        info!(?mode, "Camera mode changed");
        self.mode = mode;
    }

    /// Transform the camera should have this frame
    pub fn pose(&self) -> Transform {
        let eye = match self.mode {
            CameraMode::Pinned => Vec3::new(0.0, 0.0, self.pin_distance),
            CameraMode::Orbit => self.orbit.eye(),
        };
        let target = match self.mode {
            CameraMode::Pinned => Vec3::ZERO,
            CameraMode::Orbit => self.orbit.target,
        };
        Transform::from_translation(eye).looking_at(target, Vec3::Y)
    }
}

/// Plugin for the viewer camera
pub struct CameraPlugin;

impl Plugin for CameraPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Update, (orbit_input, apply_camera_rig).chain());
    }
}

/// Mouse and touch orbit controls; ignored while pinned
pub fn orbit_input(
    mut rig: ResMut<CameraRig>,
    mut mouse_motion: MessageReader<MouseMotion>,
    mut mouse_wheel: MessageReader<MouseWheel>,
    mouse_button: Res<ButtonInput<MouseButton>>,
    touch_input: Res<Touches>,
    time: Res<Time>,
) {
    let mut total_motion = Vec2::ZERO;
    for motion in mouse_motion.read() {
        total_motion += motion.delta;
    }

    if rig.mode != CameraMode::Orbit {
        // Drain the scroll events even if we're not using them
        for _ in mouse_wheel.read() {}
        return;
    }

    let max_distance = rig.pin_distance * 4.0;
    let orbit = &mut rig.orbit;

    if mouse_button.pressed(MouseButton::Left) {
        orbit.rotate(total_motion);
    }

    // Pan in the camera's screen plane
    if mouse_button.pressed(MouseButton::Right) {
        let right = Vec3::new(orbit.azimuth.cos(), 0.0, -orbit.azimuth.sin());
        let pan_speed = orbit.distance * 0.002;
        orbit.target_focus -= right * total_motion.x * pan_speed;
        orbit.target_focus += Vec3::Y * total_motion.y * pan_speed;
    }

    for scroll in mouse_wheel.read() {
        let factor = 1.0 - scroll.y * orbit.zoom_speed * 0.3;
        orbit.zoom(factor, max_distance);
    }

    let touches: Vec<_> = touch_input.iter().collect();
    match touches.as_slice() {
        [touch] => orbit.rotate(touch.delta()),
        [t1, t2] => {
            let curr_dist = t1.position().distance(t2.position());
            let prev_dist = (t1.position() - t1.delta()).distance(t2.position() - t2.delta());
            orbit.zoom(prev_dist / curr_dist.max(1.0), max_distance);
        }
        _ => {}
    }

    orbit.smooth(time.delta_secs());
}

/// Write the rig pose to the main camera
pub fn apply_camera_rig(rig: Res<CameraRig>, mut camera: Query<&mut Transform, With<MainCamera>>) {
    if let Ok(mut transform) = camera.single_mut() {
        *transform = rig.pose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nudge_camera(mut camera: Query<&mut Transform, With<MainCamera>>) {
        for mut transform in &mut camera {
            transform.translation += Vec3::new(1.0, 2.0, 3.0);
        }
    }

    fn rig_app(config: &CameraConfig) -> App {
        let mut app = App::new();
        app.add_plugins(MinimalPlugins)
            .insert_resource(CameraRig::new(config))
            .add_systems(Update, (nudge_camera, apply_camera_rig).chain());
        app.world_mut()
            .spawn((MainCamera, Transform::from_xyz(3.0, 2.0, 1.0)));
        app
    }

    fn camera_transform(app: &mut App) -> Transform {
        let mut query = app
            .world_mut()
            .query_filtered::<&Transform, With<MainCamera>>();
        *query.single(app.world()).unwrap()
    }

    #[test]
    fn test_pinned_camera_overrides_other_movement() {
        let mut app = rig_app(&CameraConfig::default());

        for _ in 0..5 {
            app.update();
            let transform = camera_transform(&mut app);
            assert!(transform.translation.abs_diff_eq(Vec3::new(0.0, 0.0, 5.0), 1e-5));
            assert!((*transform.forward()).abs_diff_eq(Vec3::NEG_Z, 1e-5));
        }
    }

    #[test]
    fn test_pin_distance_from_config() {
        let config = CameraConfig {
            pin_distance: 8.0,
            ..CameraConfig::default()
        };
        let mut app = rig_app(&config);
        app.update();
        assert_eq!(camera_transform(&mut app).translation.z, 8.0);
    }

    #[test]
    fn test_orbit_starts_from_pinned_pose() {
        let mut rig = CameraRig::new(&CameraConfig::default());
        let pinned = rig.pose();

        rig.set_mode(CameraMode::Orbit);
        assert_eq!(rig.mode(), CameraMode::Orbit);
        assert!(rig.pose().translation.abs_diff_eq(pinned.translation, 1e-5));

        rig.orbit.rotate(Vec2::new(100.0, 0.0));
        assert!(!rig.pose().translation.abs_diff_eq(pinned.translation, 1e-3));
        // Distance to the target is preserved while rotating
        assert!((rig.pose().translation.length() - 5.0).abs() < 1e-4);

        rig.set_mode(CameraMode::Pinned);
        assert!(rig.pose().translation.abs_diff_eq(pinned.translation, 1e-5));
    }

    #[test]
    fn test_zoom_is_clamped() {
        let mut rig = CameraRig::new(&CameraConfig::default());
        rig.set_mode(CameraMode::Orbit);
        rig.orbit.zoom(100.0, 20.0);
        assert_eq!(rig.orbit.target_distance, 20.0);
        rig.orbit.zoom(0.0, 20.0);
        assert_eq!(rig.orbit.target_distance, 0.5);
    }
}
