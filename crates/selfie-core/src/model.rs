//! Model source handling, load bookkeeping, framing and spin

use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;
use tracing::{debug, info, warn};

use crate::config::ModelConfig;
use crate::error::AssetLoadError;

/// URL of a loadable 3D asset (never empty)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelSource(String);

impl ModelSource {
    /// Parse user input into a source; blank input means "no model"
    pub fn parse(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ModelSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Canonical footprint applied to every loaded model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Framing {
    /// Uniform scale factor
    pub scale: f32,
    /// Offset along the vertical axis
    pub offset_y: f32,
}

impl Default for Framing {
    fn default() -> Self {
        Self {
            scale: 0.1,
            offset_y: -0.5,
        }
    }
}

impl Framing {
    pub fn from_config(config: &ModelConfig) -> Self {
        Self {
            scale: config.scale,
            offset_y: config.offset_y,
        }
    }

    /// Translation of the model root as (x, y, z)
    pub fn translation(&self) -> [f32; 3] {
        [0.0, self.offset_y, 0.0]
    }
}

/// Unconditional per-frame spin about the vertical axis
///
/// The angle is derived from the frame counter so it does not drift with
/// floating point accumulation or wall-clock timing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spin {
    increment: f32,
    frames: u64,
}

impl Default for Spin {
    fn default() -> Self {
        Self::new(0.01)
    }
}

impl Spin {
    pub fn new(increment: f32) -> Self {
        Self { increment, frames: 0 }
    }

    /// Advance by one rendered frame and return the new angle
    pub fn advance(&mut self) -> f32 {
        self.frames += 1;
        self.angle()
    }

    /// Current angle in radians, wrapped to [0, 2π)
    pub fn angle(&self) -> f32 {
        let raw = self.frames as f64 * f64::from(self.increment);
        raw.rem_euclid(TAU) as f32
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn increment(&self) -> f32 {
        self.increment
    }
}

/// Identifies one load request; only the newest ticket may apply its result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    pub generation: u64,
    pub source: ModelSource,
}

/// What the presenter currently shows
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ModelStatus {
    /// No source configured, nothing in the scene
    #[default]
    Absent,
    Loading(ModelSource),
    Ready(ModelSource),
    Failed {
        source: ModelSource,
        error: AssetLoadError,
    },
}

impl ModelStatus {
    pub fn source(&self) -> Option<&ModelSource> {
        match self {
            Self::Absent => None,
            Self::Loading(source) | Self::Ready(source) => Some(source),
            Self::Failed { source, .. } => Some(source),
        }
    }
}

/// Result of reporting a finished load back to the tracker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The load belongs to the current source and the model should be shown
    Applied,
    /// The load belongs to the current source but failed
    Failed(AssetLoadError),
    /// A newer request superseded this one; discard the result
    Stale,
}

/// Tracks the in-flight model load so a late completion for an old source
/// never overwrites a newer one
#[derive(Debug, Clone, Default)]
pub struct ModelLoadTracker {
    generation: u64,
    current: Option<LoadTicket>,
    status: ModelStatus,
}

impl ModelLoadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start loading `input`, cancelling whatever was in flight.
    ///
    /// Returns `None` when the input is blank: the presenter is removed.
    pub fn request(&mut self, input: &str) -> Option<LoadTicket> {
        self.generation += 1;

        if let Some(previous) = self.current.take() {
            debug!(
                generation = previous.generation,
                source = %previous.source,
                "Cancelling previous model load"
            );
        }

        match ModelSource::parse(input) {
            Some(source) => {
                info!(generation = self.generation, source = %source, "Loading model");
                let ticket = LoadTicket {
                    generation: self.generation,
                    source: source.clone(),
                };
                self.current = Some(ticket.clone());
                self.status = ModelStatus::Loading(source);
                Some(ticket)
            }
            None => {
                info!("Model source cleared");
                self.status = ModelStatus::Absent;
                None
            }
        }
    }

    /// Whether `ticket` is still the newest request
    pub fn is_current(&self, ticket: &LoadTicket) -> bool {
        self.current.as_ref() == Some(ticket)
    }

    /// Report the end of a load
    pub fn complete(
        &mut self,
        ticket: &LoadTicket,
        result: Result<(), AssetLoadError>,
    ) -> LoadOutcome {
        if !self.is_current(ticket) {
            debug!(generation = ticket.generation, source = %ticket.source, "Discarding stale model load");
            return LoadOutcome::Stale;
        }

        match result {
            Ok(()) => {
                info!(source = %ticket.source, "Model ready");
                self.status = ModelStatus::Ready(ticket.source.clone());
                LoadOutcome::Applied
            }
            Err(error) => {
                warn!(source = %ticket.source, error = %error, "Model load failed");
                self.status = ModelStatus::Failed {
                    source: ticket.source.clone(),
                    error: error.clone(),
                };
                self.current = None;
                LoadOutcome::Failed(error)
            }
        }
    }

    pub fn status(&self) -> &ModelStatus {
        &self.status
    }

    pub fn current(&self) -> Option<&LoadTicket> {
        self.current.as_ref()
    }
}
