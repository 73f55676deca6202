//! Platform seams
//!
//! The browser crate implements these with `getUserMedia`, `MediaRecorder`
//! and object URLs. Tests implement them with scripted doubles. Browser
//! handles are not `Send`, so the wrappers live in non-send resources.

use selfie_core::{AcquisitionError, ArtifactRegistry, CaptureError, IntervalId, Segment};
use std::ops::{Deref, DerefMut};

/// One decoded camera frame, tightly packed RGBA8
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl VideoFrame {
    /// Frame whose buffer length matches its dimensions
    pub fn is_well_formed(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.rgba.len() == self.width as usize * self.height as usize * 4
    }
}

/// State of the live camera feed
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FeedStatus {
    /// Access requested, no answer yet
    #[default]
    Pending,
    Live { width: u32, height: u32 },
    Failed(AcquisitionError),
}

impl FeedStatus {
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live { .. })
    }
}

/// A source of camera frames
pub trait FrameSource: 'static {
    /// Request device access. Called once, when the camera plane is created.
    fn activate(&mut self);

    fn status(&self) -> FeedStatus;

    /// Newest frame since the previous call, if any
    fn latest_frame(&mut self) -> Option<VideoFrame>;

    /// Stop the device. Safe to call more than once.
    fn release(&mut self);
}

/// Parameters for one recording interval
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderRequest {
    pub interval: IntervalId,
    /// Selector of the canvas to capture (None: the primary surface)
    pub canvas: Option<String>,
    pub fps: u32,
    pub mime_type: String,
    /// Emit a segment every this many milliseconds (None: one at stop)
    pub timeslice_ms: Option<u32>,
}

/// Something the encoder reports asynchronously
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncoderEvent {
    Segment(Segment),
    /// No more segments will follow for `interval`; `total` counts all of them
    Finished { interval: IntervalId, total: u64 },
    Failed { interval: IntervalId, reason: String },
}

/// Encodes the composited surface into segments
pub trait MediaEncoder: 'static {
    fn start(&mut self, request: &EncoderRequest) -> Result<(), CaptureError>;

    /// Ask the encoder to flush and finish `interval`
    fn stop(&mut self, interval: IntervalId);

    /// Events gathered since the previous call, in arrival order
    fn drain_events(&mut self) -> Vec<EncoderEvent>;
}

macro_rules! backend_wrapper {
    ($(#[$meta:meta])* $name:ident, $trait:ident) => {
        $(#[$meta])*
        pub struct $name(pub Box<dyn $trait>);

        impl $name {
            pub fn new(inner: impl $trait + 'static) -> Self {
                Self(Box::new(inner))
            }
        }

        impl Deref for $name {
            type Target = dyn $trait;

            fn deref(&self) -> &Self::Target {
                self.0.as_ref()
            }
        }

        impl DerefMut for $name {
            fn deref_mut(&mut self) -> &mut Self::Target {
                self.0.as_mut()
            }
        }
    };
}

backend_wrapper!(
    /// Non-send resource holding the camera implementation
    CameraBackend,
    FrameSource
);

backend_wrapper!(
    /// Non-send resource holding the encoder implementation
    EncoderBackend,
    MediaEncoder
);

backend_wrapper!(
    /// Non-send resource holding the artifact registry
    ArtifactBackend,
    ArtifactRegistry
);

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted backends shared by the plugin tests

    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    #[derive(Default)]
    pub struct CameraScript {
        pub status: FeedStatus,
        pub frames: VecDeque<VideoFrame>,
        pub activations: u32,
        pub releases: u32,
    }

    #[derive(Clone, Default)]
    pub struct ScriptedCamera(pub Rc<RefCell<CameraScript>>);

    impl FrameSource for ScriptedCamera {
        fn activate(&mut self) {
            self.0.borrow_mut().activations += 1;
        }

        fn status(&self) -> FeedStatus {
            self.0.borrow().status.clone()
        }

        fn latest_frame(&mut self) -> Option<VideoFrame> {
            self.0.borrow_mut().frames.pop_back()
        }

        fn release(&mut self) {
            self.0.borrow_mut().releases += 1;
        }
    }

    #[derive(Default)]
    pub struct EncoderScript {
        pub requests: Vec<EncoderRequest>,
        pub stops: Vec<IntervalId>,
        pub pending: Vec<EncoderEvent>,
        pub refuse_with: Option<CaptureError>,
    }

    #[derive(Clone, Default)]
    pub struct ScriptedEncoder(pub Rc<RefCell<EncoderScript>>);

    impl MediaEncoder for ScriptedEncoder {
        fn start(&mut self, request: &EncoderRequest) -> Result<(), CaptureError> {
            let mut script = self.0.borrow_mut();
            if let Some(err) = script.refuse_with.clone() {
                return Err(err);
            }
            script.requests.push(request.clone());
            Ok(())
        }

        fn stop(&mut self, interval: IntervalId) {
            self.0.borrow_mut().stops.push(interval);
        }

        fn drain_events(&mut self) -> Vec<EncoderEvent> {
            std::mem::take(&mut self.0.borrow_mut().pending)
        }
    }

    #[derive(Clone, Default)]
    pub struct SharedRegistry(pub Rc<RefCell<selfie_core::MemoryRegistry>>);

    impl ArtifactRegistry for SharedRegistry {
        fn publish(&mut self, bytes: &[u8], mime_type: &str) -> Result<String, CaptureError> {
            self.0.borrow_mut().publish(bytes, mime_type)
        }

        fn revoke(&mut self, url: &str) {
            self.0.borrow_mut().revoke(url)
        }

        fn download(&mut self, url: &str, file_name: &str) -> Result<(), CaptureError> {
            self.0.borrow_mut().download(url, file_name)
        }
    }
}
