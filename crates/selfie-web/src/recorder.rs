//! Canvas recorder
//!
//! Each interval gets its own `MediaRecorder` on `canvas.captureStream()`.
//! Segments are stamped with their arrival index when `dataavailable`
//! fires; the blob bytes are read asynchronously and may complete out of
//! order, which the recording session reorders.

use selfie_core::{CaptureError, IntervalId, Segment};
use selfie_scene::{EncoderEvent, EncoderRequest, MediaEncoder};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{
    BlobEvent, HtmlCanvasElement, MediaRecorder, MediaRecorderOptions, MediaStream,
    MediaStreamTrack,
};

type EventQueue = Rc<RefCell<Vec<EncoderEvent>>>;

struct ActiveRecorder {
    recorder: MediaRecorder,
    stream: MediaStream,
    _on_data: Closure<dyn FnMut(BlobEvent)>,
    _on_stop: Closure<dyn FnMut(web_sys::Event)>,
    _on_error: Closure<dyn FnMut(web_sys::Event)>,
}

impl ActiveRecorder {
    fn shutdown(self) {
        self.recorder.set_ondataavailable(None);
        self.recorder.set_onstop(None);
        self.recorder.set_onerror(None);
        if self.recorder.state() != web_sys::RecordingState::Inactive {
            self.recorder.stop().ok();
        }
        for track in self.stream.get_tracks().iter() {
            if let Ok(track) = track.dyn_into::<MediaStreamTrack>() {
                track.stop();
            }
        }
    }
}

/// `MediaRecorder` behind the [`MediaEncoder`] seam
#[derive(Default)]
pub struct CanvasRecorder {
    events: EventQueue,
    active: HashMap<IntervalId, ActiveRecorder>,
}

impl CanvasRecorder {
    pub fn new() -> Self {
        Self::default()
    }
}

fn js_reason(value: &JsValue) -> String {
    value
        .dyn_ref::<js_sys::Error>()
        .map(|e| String::from(e.message()))
        .unwrap_or_else(|| format!("{:?}", value))
}

fn find_canvas(selector: Option<&str>) -> Result<HtmlCanvasElement, CaptureError> {
    let document = web_sys::window()
        .and_then(|w| w.document())
        .ok_or(CaptureError::NoSurface)?;
    let element = match selector {
        Some(selector) => document.query_selector(selector).ok().flatten(),
        None => document.query_selector("canvas").ok().flatten(),
    };
    element
        .and_then(|e| e.dyn_into::<HtmlCanvasElement>().ok())
        .ok_or(CaptureError::NoSurface)
}

fn read_segment(events: EventQueue, interval: IntervalId, index: u64, blob: web_sys::Blob) {
    wasm_bindgen_futures::spawn_local(async move {
        let event = match JsFuture::from(blob.array_buffer()).await {
            Ok(buffer) => EncoderEvent::Segment(Segment {
                interval,
                index,
                data: js_sys::Uint8Array::new(&buffer).to_vec(),
            }),
            Err(e) => EncoderEvent::Failed {
                interval,
                reason: format!("could not read segment {}: {}", index, js_reason(&e)),
            },
        };
        events.borrow_mut().push(event);
    });
}

impl MediaEncoder for CanvasRecorder {
    fn start(&mut self, request: &EncoderRequest) -> Result<(), CaptureError> {
        if !MediaRecorder::is_type_supported(&request.mime_type) {
            return Err(CaptureError::UnsupportedMime(request.mime_type.clone()));
        }

        let canvas = find_canvas(request.canvas.as_deref())?;
        let stream = canvas
            .capture_stream_with_frame_request_rate(f64::from(request.fps))
            .map_err(|e| CaptureError::Encoder(js_reason(&e)))?;

        let options = MediaRecorderOptions::new();
        options.set_mime_type(&request.mime_type);
        let recorder =
            MediaRecorder::new_with_media_stream_and_media_recorder_options(&stream, &options)
                .map_err(|e| CaptureError::Encoder(js_reason(&e)))?;

        let interval = request.interval;
        let next_index = Rc::new(Cell::new(0u64));

        let on_data = {
            let events = self.events.clone();
            let next_index = next_index.clone();
            Closure::wrap(Box::new(move |event: BlobEvent| {
                let index = next_index.get();
                next_index.set(index + 1);
                match event.data() {
                    Some(blob) if blob.size() > 0.0 => {
                        read_segment(events.clone(), interval, index, blob)
                    }
                    // Empty segments still take an index so completion can count them
                    _ => events.borrow_mut().push(EncoderEvent::Segment(Segment {
                        interval,
                        index,
                        data: Vec::new(),
                    })),
                }
            }) as Box<dyn FnMut(BlobEvent)>)
        };

        let on_stop = {
            let events = self.events.clone();
            let next_index = next_index.clone();
            Closure::wrap(Box::new(move |_: web_sys::Event| {
                events.borrow_mut().push(EncoderEvent::Finished {
                    interval,
                    total: next_index.get(),
                });
            }) as Box<dyn FnMut(web_sys::Event)>)
        };

        let on_error = {
            let events = self.events.clone();
            Closure::wrap(Box::new(move |event: web_sys::Event| {
                events.borrow_mut().push(EncoderEvent::Failed {
                    interval,
                    reason: format!("MediaRecorder {} event", event.type_()),
                });
            }) as Box<dyn FnMut(web_sys::Event)>)
        };

        recorder.set_ondataavailable(Some(on_data.as_ref().unchecked_ref()));
        recorder.set_onstop(Some(on_stop.as_ref().unchecked_ref()));
        recorder.set_onerror(Some(on_error.as_ref().unchecked_ref()));

        let started = match request.timeslice_ms {
            Some(ms) => recorder.start_with_time_slice(ms.min(i32::MAX as u32) as i32),
            None => recorder.start(),
        };
        let active = ActiveRecorder {
            recorder,
            stream,
            _on_data: on_data,
            _on_stop: on_stop,
            _on_error: on_error,
        };
        if let Err(e) = started {
            active.shutdown();
            return Err(CaptureError::Encoder(js_reason(&e)));
        }

        tracing::info!(
            "Recording {} at {} fps as {}",
            interval,
            request.fps,
            request.mime_type
        );
        self.active.insert(interval, active);
        Ok(())
    }

    fn stop(&mut self, interval: IntervalId) {
        match self.active.get(&interval) {
            Some(active) => {
                if let Err(e) = active.recorder.stop() {
                    tracing::warn!("MediaRecorder refused to stop: {}", js_reason(&e));
                }
            }
            None => tracing::warn!("No recorder for interval {}", interval),
        }
    }

    fn drain_events(&mut self) -> Vec<EncoderEvent> {
        let events = std::mem::take(&mut *self.events.borrow_mut());
        for event in &events {
            if let EncoderEvent::Finished { interval, .. } | EncoderEvent::Failed { interval, .. } =
                event
            {
                if let Some(active) = self.active.remove(interval) {
                    active.shutdown();
                }
            }
        }
        events
    }
}

impl Drop for CanvasRecorder {
    fn drop(&mut self) {
        for (_, active) in self.active.drain() {
            active.shutdown();
        }
    }
}
