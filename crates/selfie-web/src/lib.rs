//! Selfie Web - browser frontend for the selfie video filter
//!
//! Resolves the configuration, installs the browser backends (webcam,
//! canvas recorder, object URLs, DOM controls) and runs the Bevy app.

mod app;
mod config;

#[cfg(target_arch = "wasm32")]
mod artifact;
#[cfg(target_arch = "wasm32")]
mod dom;
#[cfg(target_arch = "wasm32")]
mod recorder;
#[cfg(target_arch = "wasm32")]
mod webcam;

use wasm_bindgen::prelude::*;

/// Entry point for WASM module
#[wasm_bindgen(start)]
pub fn main() {
    // Set panic hook for better error messages
    console_error_panic_hook::set_once();

    // WARN by default to keep wgpu noise out of the console; `?log=info` raises it
    #[cfg(target_arch = "wasm32")]
    let requested = config::query_param("log");
    #[cfg(not(target_arch = "wasm32"))]
    let requested: Option<String> = None;

    tracing_wasm::set_as_global_default_with_config(
        tracing_wasm::WASMLayerConfigBuilder::new()
            .set_max_level(config::log_level(requested.as_deref()))
            .build(),
    );

    #[cfg(target_arch = "wasm32")]
    wasm_bindgen_futures::spawn_local(async {
        let config = config::resolve().await;
        app::run(config);
    });

    #[cfg(not(target_arch = "wasm32"))]
    app::run(config::merge(None, &[]));
}
