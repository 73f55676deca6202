//! Webcam frame source
//!
//! `getUserMedia` feeds a hidden `<video>` element. Each frame the newest
//! video image is drawn into an offscreen canvas and read back as RGBA.

use selfie_core::AcquisitionError;
use selfie_scene::{FeedStatus, FrameSource, VideoFrame};
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{
    CanvasRenderingContext2d, DomException, HtmlCanvasElement, HtmlVideoElement, MediaStream,
    MediaStreamConstraints, MediaStreamTrack,
};

/// `HTMLMediaElement.HAVE_CURRENT_DATA`
const HAVE_CURRENT_DATA: u16 = 2;

#[derive(Default)]
struct Shared {
    status: FeedStatus,
    stream: Option<MediaStream>,
    released: bool,
}

struct Sampler {
    canvas: HtmlCanvasElement,
    context: CanvasRenderingContext2d,
    last_time: f64,
}

/// Browser webcam behind the [`FrameSource`] seam
#[derive(Default)]
pub struct Webcam {
    shared: Rc<RefCell<Shared>>,
    video: Option<HtmlVideoElement>,
    sampler: Option<Sampler>,
}

impl Webcam {
    pub fn new() -> Self {
        Self::default()
    }

    fn fail(&self, error: AcquisitionError) {
        self.shared.borrow_mut().status = FeedStatus::Failed(error);
    }

    /// Video dimensions once the stream is playing
    fn playing_size(&self) -> Option<(u32, u32)> {
        let video = self.video.as_ref()?;
        if video.ready_state() < HAVE_CURRENT_DATA {
            return None;
        }
        let (width, height) = (video.video_width(), video.video_height());
        (width > 0 && height > 0).then_some((width, height))
    }

    fn sampler(&mut self) -> Option<&mut Sampler> {
        if self.sampler.is_none() {
            let document = web_sys::window()?.document()?;
            let canvas = document
                .create_element("canvas")
                .ok()?
                .dyn_into::<HtmlCanvasElement>()
                .ok()?;
            let context = canvas
                .get_context("2d")
                .ok()??
                .dyn_into::<CanvasRenderingContext2d>()
                .ok()?;
            self.sampler = Some(Sampler {
                canvas,
                context,
                last_time: -1.0,
            });
        }
        self.sampler.as_mut()
    }
}

fn create_video_element() -> Result<HtmlVideoElement, JsValue> {
    let document = web_sys::window()
        .and_then(|w| w.document())
        .ok_or_else(|| JsValue::from_str("no document"))?;
    let video = document
        .create_element("video")?
        .dyn_into::<HtmlVideoElement>()?;
    video.set_autoplay(true);
    video.set_muted(true);
    video.set_attribute("playsinline", "")?;
    video.style().set_property("display", "none")?;
    if let Some(body) = document.body() {
        body.append_child(&video)?;
    }
    Ok(video)
}

/// Map a rejected `getUserMedia` promise to an acquisition error
fn acquisition_error(value: &JsValue) -> AcquisitionError {
    if let Some(exception) = value.dyn_ref::<DomException>() {
        return AcquisitionError::from_dom_name(&exception.name(), exception.message());
    }
    if let Some(error) = value.dyn_ref::<js_sys::Error>() {
        return AcquisitionError::from_dom_name(
            &String::from(error.name()),
            String::from(error.message()),
        );
    }
    AcquisitionError::Other(format!("{:?}", value))
}

fn stop_tracks(stream: &MediaStream) {
    for track in stream.get_tracks().iter() {
        if let Ok(track) = track.dyn_into::<MediaStreamTrack>() {
            track.stop();
        }
    }
}

impl FrameSource for Webcam {
    fn activate(&mut self) {
        if self.video.is_some() {
            return;
        }

        let video = match create_video_element() {
            Ok(video) => video,
            Err(e) => {
                self.fail(AcquisitionError::Unsupported(format!("{:?}", e)));
                return;
            }
        };

        let devices = web_sys::window()
            .ok_or_else(|| JsValue::from_str("no window"))
            .and_then(|w| w.navigator().media_devices());
        let devices = match devices {
            Ok(devices) => devices,
            Err(_) => {
                self.fail(AcquisitionError::Unsupported(
                    "media devices are not available (insecure context?)".to_string(),
                ));
                return;
            }
        };

        let constraints = MediaStreamConstraints::new();
        constraints.set_video(&JsValue::TRUE);
        let promise = match devices.get_user_media_with_constraints(&constraints) {
            Ok(promise) => promise,
            Err(e) => {
                self.fail(acquisition_error(&e));
                return;
            }
        };

        let shared = self.shared.clone();
        let target = video.clone();
        wasm_bindgen_futures::spawn_local(async move {
            let result = JsFuture::from(promise).await;
            let mut shared = shared.borrow_mut();
            match result.and_then(|value| value.dyn_into::<MediaStream>().map_err(JsValue::from)) {
                Ok(stream) if shared.released => {
                    tracing::info!("Camera granted after release, stopping it");
                    stop_tracks(&stream);
                }
                Ok(stream) => {
                    target.set_src_object(Some(&stream));
                    if let Err(e) = target.play() {
                        tracing::warn!("Video element refused to play: {:?}", e);
                    }
                    shared.stream = Some(stream);
                }
                Err(e) => {
                    let error = acquisition_error(&e);
                    tracing::warn!("Camera access failed: {}", error);
                    shared.status = FeedStatus::Failed(error);
                }
            }
        });

        self.video = Some(video);
    }

    fn status(&self) -> FeedStatus {
        let mut shared = self.shared.borrow_mut();
        if shared.status == FeedStatus::Pending && shared.stream.is_some() {
            if let Some((width, height)) = self.playing_size() {
                shared.status = FeedStatus::Live { width, height };
            }
        }
        shared.status.clone()
    }

    fn latest_frame(&mut self) -> Option<VideoFrame> {
        let (width, height) = self.playing_size()?;
        let video = self.video.clone()?;
        let sampler = self.sampler()?;

        // Skip when the video has not advanced since the last sample
        let time = video.current_time();
        if time == sampler.last_time {
            return None;
        }
        sampler.last_time = time;

        if sampler.canvas.width() != width || sampler.canvas.height() != height {
            sampler.canvas.set_width(width);
            sampler.canvas.set_height(height);
        }
        sampler
            .context
            .draw_image_with_html_video_element(&video, 0.0, 0.0)
            .ok()?;
        let image = sampler
            .context
            .get_image_data(0.0, 0.0, f64::from(width), f64::from(height))
            .ok()?;

        Some(VideoFrame {
            width,
            height,
            rgba: image.data().0,
        })
    }

    fn release(&mut self) {
        let mut shared = self.shared.borrow_mut();
        if shared.released {
            return;
        }
        shared.released = true;
        if let Some(stream) = shared.stream.take() {
            stop_tracks(&stream);
        }
        drop(shared);

        if let Some(video) = self.video.take() {
            video.set_src_object(None);
            video.remove();
        }
        self.sampler = None;
    }
}

impl Drop for Webcam {
    fn drop(&mut self) {
        self.release();
    }
}
