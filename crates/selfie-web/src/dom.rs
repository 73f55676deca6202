//! DOM controls
//!
//! The widgets sit next to the canvas rather than inside it, so recordings
//! only contain the composited scene. Widget callbacks push into a queue
//! that a Bevy system drains into [`ControlEvent`] messages.

use bevy::prelude::*;
use selfie_core::CameraMode;
use selfie_scene::controls::{
    DOWNLOAD_LABEL, HEADING, MODEL_URL_LABEL, MODEL_URL_PLACEHOLDER,
};
use selfie_scene::{ControlEvent, ControlView};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{
    Document, Element, HtmlButtonElement, HtmlElement, HtmlInputElement, HtmlSelectElement,
};

/// Id of the element the controls are built into
pub const CONTAINER_ID: &str = "filter-controls";

type Pending = Rc<RefCell<VecDeque<ControlEvent>>>;

/// Handles to the widgets, kept as a non-send resource
pub struct DomControls {
    pending: Pending,
    model_input: HtmlInputElement,
    model_status: HtmlElement,
    camera_status: HtmlElement,
    camera_mode: HtmlSelectElement,
    record_button: HtmlButtonElement,
    elapsed: HtmlElement,
    download_button: HtmlButtonElement,
    errors: HtmlElement,
    _closures: Vec<Closure<dyn FnMut(web_sys::Event)>>,
}

/// Plugin that builds the controls and binds them to the scene
pub struct DomControlsPlugin;

impl Plugin for DomControlsPlugin {
    fn build(&self, app: &mut App) {
        match DomControls::build() {
            Ok(controls) => {
                app.insert_non_send_resource(controls)
                    .add_systems(First, forward_control_events)
                    .add_systems(Last, render_controls);
            }
            Err(e) => tracing::error!("Failed to build controls: {:?}", e),
        }
    }
}

fn create<T: JsCast>(document: &Document, tag: &str, parent: &Element) -> Result<T, JsValue> {
    let element = document.create_element(tag)?;
    parent.append_child(&element)?;
    element.dyn_into::<T>().map_err(JsValue::from)
}

fn container(document: &Document) -> Result<Element, JsValue> {
    if let Some(existing) = document.get_element_by_id(CONTAINER_ID) {
        return Ok(existing);
    }
    let element = document.create_element("div")?;
    element.set_id(CONTAINER_ID);
    document
        .body()
        .ok_or_else(|| JsValue::from_str("no document body"))?
        .append_child(&element)?;
    Ok(element)
}

fn show(element: &HtmlElement, visible: bool) {
    let display = if visible { "" } else { "none" };
    element.style().set_property("display", display).ok();
}

impl DomControls {
    fn build() -> Result<Self, JsValue> {
        let document = web_sys::window()
            .and_then(|w| w.document())
            .ok_or_else(|| JsValue::from_str("no document"))?;
        let root = container(&document)?;
        root.set_inner_html("");

        let heading: HtmlElement = create(&document, "h1", &root)?;
        heading.set_text_content(Some(HEADING));

        let label: HtmlElement = create(&document, "label", &root)?;
        label.set_text_content(Some(MODEL_URL_LABEL));
        label.set_attribute("for", "model-url")?;
        let model_input: HtmlInputElement = create(&document, "input", &root)?;
        model_input.set_id("model-url");
        model_input.set_type("text");
        model_input.set_placeholder(MODEL_URL_PLACEHOLDER);
        let model_status: HtmlElement = create(&document, "p", &root)?;

        let camera_status: HtmlElement = create(&document, "p", &root)?;
        let camera_mode: HtmlSelectElement = create(&document, "select", &root)?;
        for (value, text) in [("pinned", "Fixed camera"), ("orbit", "Orbit camera")] {
            let option = document.create_element("option")?;
            option.set_attribute("value", value)?;
            option.set_text_content(Some(text));
            camera_mode.append_child(&option)?;
        }

        let record_button: HtmlButtonElement = create(&document, "button", &root)?;
        let elapsed: HtmlElement = create(&document, "span", &root)?;
        let download_button: HtmlButtonElement = create(&document, "button", &root)?;
        download_button.set_text_content(Some(DOWNLOAD_LABEL));
        show(&download_button, false);
        let errors: HtmlElement = create(&document, "div", &root)?;
        errors.set_class_name("errors");

        let pending: Pending = Rc::default();
        let mut closures = Vec::new();

        // `change` fires on enter or focus loss, once per committed edit
        {
            let pending = pending.clone();
            let input = model_input.clone();
            let closure = Closure::wrap(Box::new(move |_: web_sys::Event| {
                pending
                    .borrow_mut()
                    .push_back(ControlEvent::ModelUrlCommitted(input.value()));
            }) as Box<dyn FnMut(_)>);
            model_input.set_onchange(Some(closure.as_ref().unchecked_ref()));
            closures.push(closure);
        }
        {
            let pending = pending.clone();
            let select = camera_mode.clone();
            let closure = Closure::wrap(Box::new(move |_: web_sys::Event| {
                match select.value().parse::<CameraMode>() {
                    Ok(mode) => pending
                        .borrow_mut()
                        .push_back(ControlEvent::SetCameraMode(mode)),
                    Err(e) => tracing::warn!("{}", e),
                }
            }) as Box<dyn FnMut(_)>);
            camera_mode.set_onchange(Some(closure.as_ref().unchecked_ref()));
            closures.push(closure);
        }
        for (button, event) in [
            (&record_button, ControlEvent::ToggleRecording),
            (&download_button, ControlEvent::Download),
        ] {
            let pending = pending.clone();
            let closure = Closure::wrap(Box::new(move |_: web_sys::Event| {
                pending.borrow_mut().push_back(event.clone());
            }) as Box<dyn FnMut(_)>);
            button.set_onclick(Some(closure.as_ref().unchecked_ref()));
            closures.push(closure);
        }

        Ok(Self {
            pending,
            model_input,
            model_status,
            camera_status,
            camera_mode,
            record_button,
            elapsed,
            download_button,
            errors,
            _closures: closures,
        })
    }

    fn render(&self, view: &ControlView) {
        // Never overwrite what the user is typing
        let focused = web_sys::window()
            .and_then(|w| w.document())
            .and_then(|d| d.active_element())
            .is_some_and(|active| active == **self.model_input);
        if !focused && self.model_input.value() != view.model_url {
            self.model_input.set_value(&view.model_url);
        }

        self.model_status.set_text_content(Some(&view.model_status));
        self.camera_status.set_text_content(Some(&view.camera_status));
        self.camera_mode.set_value(match view.camera_mode {
            CameraMode::Pinned => "pinned",
            CameraMode::Orbit => "orbit",
        });

        self.record_button.set_text_content(Some(view.record_label));
        self.record_button
            .set_class_name(if view.recording { "recording" } else { "" });

        let elapsed = match (&view.elapsed, view.finalizing) {
            (Some(elapsed), _) => format!("● {}", elapsed),
            (None, true) => "Finishing recording…".to_string(),
            (None, false) => String::new(),
        };
        self.elapsed.set_text_content(Some(&elapsed));

        show(&self.download_button, view.download_url.is_some());
        self.download_button
            .set_title(&format!("Save as {}", view.file_name));

        let lines: Vec<String> = view
            .errors
            .iter()
            .map(|(category, message)| format!("{}: {}", category, message))
            .collect();
        self.errors.set_text_content(Some(&lines.join("\n")));
        show(&self.errors, !lines.is_empty());
    }
}

fn forward_control_events(controls: NonSend<DomControls>, mut events: MessageWriter<ControlEvent>) {
    let drained: Vec<ControlEvent> = controls.pending.borrow_mut().drain(..).collect();
    for event in drained {
        events.write(event);
    }
}

fn render_controls(view: Res<ControlView>, controls: NonSend<DomControls>) {
    if view.is_changed() {
        controls.render(&view);
    }
}
