//! Host configuration loading and validation

use anyhow::{Context, Result};
use selfie_core::FilterConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Main configuration structure
///
/// The `[filter]` table is handed to the browser app verbatim through
/// `/api/config`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub filter: FilterConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address for web server
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Built web app (index.html, wasm bundle)
    #[serde(default = "default_web_dir")]
    pub web_dir: PathBuf,
    /// GLB files served under /models
    #[serde(default = "default_models_dir")]
    pub models_dir: PathBuf,
    /// TLS configuration (optional - enables HTTPS when present)
    #[serde(default)]
    pub tls: Option<TlsConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            web_dir: default_web_dir(),
            models_dir: default_models_dir(),
            tls: None,
        }
    }
}

/// TLS/HTTPS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM format)
    pub cert: String,
    /// Path to private key file (PEM format)
    pub key: String,
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_web_dir() -> PathBuf {
    PathBuf::from("web")
}

fn default_models_dir() -> PathBuf {
    PathBuf::from("models")
}

impl HostConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: HostConfig = toml::from_str(content)?;
        config
            .filter
            .validate()
            .context("invalid [filter] section")?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Load configuration from file, falling back to defaults when it is missing
pub fn load_config(path: &Path) -> Result<HostConfig> {
    if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config = HostConfig::from_toml_str(&content)
            .with_context(|| format!("parsing {}", path.display()))?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Ok(HostConfig::default())
    }
}
