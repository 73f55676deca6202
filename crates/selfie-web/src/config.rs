//! Configuration resolution in the browser
//!
//! Order: built-in defaults, then `/api/config` from the host (if served),
//! then `?model=&fps=&camera=&retention=` query overrides.

use selfie_core::FilterConfig;

/// Query keys that override the served configuration
#[cfg(target_arch = "wasm32")]
pub const OVERRIDE_KEYS: [&str; 4] = ["model", "fps", "camera", "retention"];

/// Combine the served document and query overrides into one config.
///
/// An unusable layer is logged and skipped; the previous layer stays.
pub fn merge(served: Option<&str>, overrides: &[(String, String)]) -> FilterConfig {
    let mut config = FilterConfig::default();

    if let Some(json) = served {
        match FilterConfig::from_json_str(json) {
            Ok(parsed) => config = parsed,
            Err(e) => tracing::warn!("Ignoring served config: {}", e),
        }
    }

    if !overrides.is_empty() {
        let mut overridden = config.clone();
        let pairs = overrides.iter().map(|(k, v)| (k.as_str(), v.as_str()));
        match overridden.apply_overrides(pairs) {
            Ok(()) => config = overridden,
            Err(e) => tracing::warn!("Ignoring URL overrides: {}", e),
        }
    }

    config
}

/// Browser log level from the `?log=` query value (WARN unless asked)
pub fn log_level(requested: Option<&str>) -> tracing::Level {
    match requested.map(str::to_lowercase).as_deref() {
        Some("trace") => tracing::Level::TRACE,
        Some("debug") => tracing::Level::DEBUG,
        Some("info") => tracing::Level::INFO,
        Some("error") => tracing::Level::ERROR,
        _ => tracing::Level::WARN,
    }
}

#[cfg(target_arch = "wasm32")]
pub async fn resolve() -> FilterConfig {
    let served = fetch_served_config().await;
    let overrides = query_overrides();
    merge(served.as_deref(), &overrides)
}

#[cfg(target_arch = "wasm32")]
async fn fetch_served_config() -> Option<String> {
    match gloo_net::http::Request::get("/api/config").send().await {
        Ok(response) if response.ok() => response.text().await.ok(),
        Ok(response) => {
            tracing::info!("No served config (HTTP {})", response.status());
            None
        }
        Err(e) => {
            tracing::info!("No served config: {:?}", e);
            None
        }
    }
}

#[cfg(target_arch = "wasm32")]
fn query_params() -> Option<web_sys::UrlSearchParams> {
    let search = web_sys::window()?.location().search().ok()?;
    web_sys::UrlSearchParams::new_with_str(&search).ok()
}

/// Value of a single query parameter of the page URL
#[cfg(target_arch = "wasm32")]
pub fn query_param(key: &str) -> Option<String> {
    query_params()?.get(key)
}

#[cfg(target_arch = "wasm32")]
fn query_overrides() -> Vec<(String, String)> {
    let Some(params) = query_params() else {
        return Vec::new();
    };

    OVERRIDE_KEYS
        .iter()
        .filter_map(|key| params.get(key).map(|value| (key.to_string(), value)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use selfie_core::CameraMode;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_without_host() {
        assert_eq!(merge(None, &[]), FilterConfig::default());
    }

    #[test]
    fn test_served_then_query() {
        let mut served = FilterConfig::default();
        served.capture.fps = 24;
        served.model.default_url = "models/served.glb".to_string();
        let json = serde_json::to_string(&served).unwrap();

        let config = merge(Some(&json), &pairs(&[("model", "https://example.com/q.glb")]));
        assert_eq!(config.capture.fps, 24);
        assert_eq!(config.model.default_url, "https://example.com/q.glb");
    }

    #[test]
    fn test_bad_layers_are_skipped() {
        let config = merge(Some("{not json"), &pairs(&[("fps", "0"), ("camera", "orbit")]));
        // fps=0 fails validation, so the whole override layer is dropped
        assert_eq!(config.capture.fps, 30);
        assert_eq!(config.camera.mode, CameraMode::Pinned);
    }

    #[test]
    fn test_log_level() {
        assert_eq!(log_level(None), tracing::Level::WARN);
        assert_eq!(log_level(Some("INFO")), tracing::Level::INFO);
        assert_eq!(log_level(Some("verbose")), tracing::Level::WARN);
    }
}
