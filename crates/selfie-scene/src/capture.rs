//! Capture controller - records the composited surface
//!
//! The recording state machine lives in [`RecordingSession`]; this module
//! drives it from UI commands and from encoder events, and publishes the
//! finished artifact through the registry backend.

use bevy::prelude::*;
use tracing::debug;
use chrono::Utc;
use selfie_core::{CaptureConfig, CaptureError, RecordingSession, RecordingState};

use crate::backend::{ArtifactBackend, EncoderBackend, EncoderEvent, EncoderRequest};
use crate::host::CompositedSurface;

/// Requests from the UI
#[derive(Message, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureCommand {
    Start,
    Stop,
    /// Start when idle, stop when recording
    Toggle,
    /// Offer the latest artifact as a file
    Download,
}

/// Recording session plus the encoder parameters it starts with
#[derive(Resource)]
pub struct CaptureController {
    pub session: RecordingSession,
    fps: u32,
    timeslice_ms: Option<u32>,
}

impl CaptureController {
    pub fn new(config: &CaptureConfig) -> Self {
        Self {
            session: RecordingSession::new(config),
            fps: config.fps,
            timeslice_ms: config.timeslice_ms,
        }
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    fn start(&mut self, surface: &CompositedSurface, encoder: Option<&mut EncoderBackend>) {
        let ready = surface.ready && encoder.is_some();
        let Ok(interval) = self.session.start(ready, Utc::now()) else {
            return;
        };
        let Some(encoder) = encoder else {
            return;
        };

        let request = EncoderRequest {
            interval,
            canvas: surface.canvas.clone(),
            fps: self.fps,
            mime_type: self.session.mime_type().to_string(),
            timeslice_ms: self.timeslice_ms,
        };
        if let Err(err) = encoder.start(&request) {
            self.session.abort_start(interval, err);
        }
    }

    fn stop(&mut self, encoder: Option<&mut EncoderBackend>) {
        match self.session.stop(Utc::now()) {
            Ok(interval) => {
                if let Some(encoder) = encoder {
                    encoder.stop(interval);
                }
            }
            Err(err) => debug!(error = %err, "Ignoring stop"),
        }
    }
}

/// Plugin for the capture controller
pub struct CapturePlugin;

impl Plugin for CapturePlugin {
    fn build(&self, app: &mut App) {
        app.add_message::<CaptureCommand>()
            .add_systems(Update, (handle_capture_commands, pump_encoder_events).chain());
    }
}

fn handle_capture_commands(
    mut commands: MessageReader<CaptureCommand>,
    mut controller: ResMut<CaptureController>,
    surface: Res<CompositedSurface>,
    mut encoder: Option<NonSendMut<EncoderBackend>>,
    mut artifacts: Option<NonSendMut<ArtifactBackend>>,
) {
    for command in commands.read() {
        let encoder = encoder.as_deref_mut();
        match command {
            CaptureCommand::Start => controller.start(&surface, encoder),
            CaptureCommand::Stop => controller.stop(encoder),
            CaptureCommand::Toggle => match controller.session.state() {
                RecordingState::Idle => controller.start(&surface, encoder),
                RecordingState::Recording => controller.stop(encoder),
            },
            CaptureCommand::Download => match artifacts.as_deref_mut() {
                Some(registry) => {
                    if controller.session.download(&mut **registry).is_ok() {
                        debug!("Download offered");
                    }
                }
                None => controller
                    .session
                    .report(CaptureError::Publish("no artifact registry".to_string())),
            },
        }
    }
}

fn pump_encoder_events(
    mut controller: ResMut<CaptureController>,
    encoder: Option<NonSendMut<EncoderBackend>>,
    artifacts: Option<NonSendMut<ArtifactBackend>>,
) {
    let Some(mut encoder) = encoder else {
        return;
    };

    let session = &mut controller.session;
    for event in encoder.drain_events() {
        match event {
            EncoderEvent::Segment(segment) => {
                session.accept(segment);
            }
            EncoderEvent::Finished { interval, total } => {
                session.encoder_finished(interval, total, Utc::now());
            }
            EncoderEvent::Failed { interval, reason } => {
                session.encoder_failed(interval, &reason);
            }
        }
    }

    if !session.is_finalizing() {
        return;
    }
    let Some(mut artifacts) = artifacts else {
        return;
    };
    if let Ok(Some(artifact)) = session.publish_ready(&mut **artifacts) {
        debug!(url = %artifact.url, "Artifact ready for download");
    }
}
