//! Camera plane - the live webcam feed as a textured backdrop
//!
//! The plane sits at the origin facing the viewer. It stays hidden until
//! the feed is live, so a denied or missing camera leaves an empty
//! background while the rest of the scene keeps running.

use bevy::asset::RenderAssetUsages;
use bevy::prelude::*;
use tracing::{debug, info, warn};
use bevy::render::render_resource::{Extent3d, TextureDimension, TextureFormat};
use selfie_core::AcquisitionError;

use crate::backend::{CameraBackend, FeedStatus, VideoFrame};
use crate::FilterSettings;

/// Marker component for the plane entity
#[derive(Component)]
pub struct CameraPlane;

/// Live feed state and the texture it is streamed into
#[derive(Debug, Resource)]
pub struct CameraFeed {
    pub status: FeedStatus,
    pub image: Handle<Image>,
    pub material: Handle<StandardMaterial>,
    pub frames_uploaded: u64,
}

/// Plugin for the camera plane
pub struct CameraPlanePlugin;

impl Plugin for CameraPlanePlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, spawn_camera_plane)
            .add_systems(Update, sync_camera_feed)
            .add_systems(Last, release_camera_on_exit);
    }
}

fn placeholder_image() -> Image {
    Image::new_fill(
        Extent3d {
            width: 1,
            height: 1,
            depth_or_array_layers: 1,
        },
        TextureDimension::D2,
        &[0, 0, 0, 255],
        TextureFormat::Rgba8UnormSrgb,
        RenderAssetUsages::MAIN_WORLD | RenderAssetUsages::RENDER_WORLD,
    )
}

fn spawn_camera_plane(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    mut images: ResMut<Assets<Image>>,
    settings: Res<FilterSettings>,
    backend: Option<NonSendMut<CameraBackend>>,
) {
    let camera = &settings.0.camera;
    let image = images.add(placeholder_image());
    let material = materials.add(StandardMaterial {
        base_color_texture: Some(image.clone()),
        unlit: true,
        ..default()
    });

    commands.spawn((
        Mesh3d(meshes.add(Rectangle::new(camera.plane_width, camera.plane_height))),
        MeshMaterial3d(material.clone()),
        Transform::IDENTITY,
        Visibility::Hidden,
        CameraPlane,
    ));

    let status = match backend {
        Some(mut backend) => {
            info!("Requesting camera access");
            backend.activate();
            FeedStatus::Pending
        }
        None => FeedStatus::Failed(AcquisitionError::Unsupported(
            "no camera backend available".to_string(),
        )),
    };
    if let FeedStatus::Failed(err) = &status {
        warn!(error = %err, "Camera unavailable, showing the scene without a feed");
    }

    commands.insert_resource(CameraFeed {
        status,
        image,
        material,
        frames_uploaded: 0,
    });
}

fn sync_camera_feed(
    backend: Option<NonSendMut<CameraBackend>>,
    mut feed: ResMut<CameraFeed>,
    mut images: ResMut<Assets<Image>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    mut planes: Query<&mut Visibility, With<CameraPlane>>,
) {
    let Some(mut backend) = backend else {
        return;
    };

    let status = backend.status();
    if status != feed.status {
        match &status {
            FeedStatus::Live { width, height } => {
                info!(width, height, "Camera feed live");
            }
            FeedStatus::Failed(err) => {
                warn!(error = %err, "Camera acquisition failed");
            }
            FeedStatus::Pending => {}
        }

        let visibility = if status.is_live() {
            Visibility::Inherited
        } else {
            Visibility::Hidden
        };
        for mut plane in &mut planes {
            *plane = visibility;
        }
        feed.status = status;
    }

    if !feed.status.is_live() {
        return;
    }

    if let Some(frame) = backend.latest_frame() {
        if upload_frame(&mut images, &feed.image, frame) {
            // Rebind the texture so the material picks up a resized image
            let _ = materials.get_mut(&feed.material);
            feed.frames_uploaded += 1;
        }
    }
}

fn upload_frame(images: &mut Assets<Image>, handle: &Handle<Image>, frame: VideoFrame) -> bool {
    if !frame.is_well_formed() {
        debug!(
            width = frame.width,
            height = frame.height,
            len = frame.rgba.len(),
            "Skipping malformed camera frame"
        );
        return false;
    }

    let Some(image) = images.get_mut(handle) else {
        return false;
    };

    let size = image.texture_descriptor.size;
    if size.width != frame.width || size.height != frame.height {
        image.resize(Extent3d {
            width: frame.width,
            height: frame.height,
            depth_or_array_layers: 1,
        });
    }
    image.data = Some(frame.rgba);
    true
}

fn release_camera_on_exit(
    mut exits: MessageReader<AppExit>,
    backend: Option<NonSendMut<CameraBackend>>,
) {
    if exits.read().next().is_none() {
        return;
    }
    if let Some(mut backend) = backend {
        info!("Releasing camera");
        backend.release();
    }
}
