//! Object URL artifact registry
//!
//! Finished recordings become `Blob`s behind `blob:` URLs. Downloads go
//! through a temporary anchor element.

use selfie_core::{ArtifactRegistry, CaptureError};
use wasm_bindgen::JsCast;
use web_sys::{Blob, BlobPropertyBag, HtmlAnchorElement, Url};

/// Registry backed by `URL.createObjectURL`
#[derive(Default)]
pub struct ObjectUrlRegistry {
    live: Vec<String>,
}

impl ObjectUrlRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ArtifactRegistry for ObjectUrlRegistry {
    fn publish(&mut self, bytes: &[u8], mime_type: &str) -> Result<String, CaptureError> {
        let uint8_array = js_sys::Uint8Array::from(bytes);
        let array = js_sys::Array::new();
        array.push(&uint8_array);

        let blob_options = BlobPropertyBag::new();
        blob_options.set_type(mime_type);

        let blob = Blob::new_with_u8_array_sequence_and_options(&array, &blob_options)
            .map_err(|e| CaptureError::Publish(format!("{:?}", e)))?;
        let url = Url::create_object_url_with_blob(&blob)
            .map_err(|e| CaptureError::Publish(format!("{:?}", e)))?;

        self.live.push(url.clone());
        Ok(url)
    }

    fn revoke(&mut self, url: &str) {
        self.live.retain(|u| u != url);
        if let Err(e) = Url::revoke_object_url(url) {
            tracing::warn!("Failed to revoke {}: {:?}", url, e);
        }
    }

    fn download(&mut self, url: &str, file_name: &str) -> Result<(), CaptureError> {
        let document = web_sys::window()
            .and_then(|w| w.document())
            .ok_or_else(|| CaptureError::Publish("no document".to_string()))?;
        let body = document
            .body()
            .ok_or_else(|| CaptureError::Publish("no document body".to_string()))?;

        // Create temporary anchor element for download
        let anchor = document
            .create_element("a")
            .ok()
            .and_then(|el| el.dyn_into::<HtmlAnchorElement>().ok())
            .ok_or_else(|| CaptureError::Publish("could not create anchor".to_string()))?;
        anchor.set_href(url);
        anchor.set_download(file_name);
        anchor.style().set_property("display", "none").ok();

        body.append_child(&anchor)
            .map_err(|e| CaptureError::Publish(format!("{:?}", e)))?;
        anchor.click();
        body.remove_child(&anchor).ok();

        tracing::info!("Offered {} as {}", url, file_name);
        Ok(())
    }
}

impl Drop for ObjectUrlRegistry {
    fn drop(&mut self) {
        for url in self.live.drain(..) {
            Url::revoke_object_url(&url).ok();
        }
    }
}
