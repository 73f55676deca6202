//! Web server setup and routing

use anyhow::Result;
use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use selfie_core::FilterConfig;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::info;

use crate::config::{HostConfig, ServerConfig, TlsConfig};

/// Shared state handed to request handlers
pub struct AppState {
    pub filter: FilterConfig,
}

/// Runtime configuration consumed by the browser app on startup
async fn get_config(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.filter.clone())
}

/// Build the router for a host configuration
pub fn router(server: &ServerConfig, filter: FilterConfig) -> Router {
    let state = Arc::new(AppState { filter });

    Router::new()
        .route("/api/config", get(get_config))
        .nest_service("/models", ServeDir::new(&server.models_dir))
        // Static files (WASM frontend) - must be fallback for root
        .fallback_service(ServeDir::new(&server.web_dir))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Run the web server (HTTP or HTTPS depending on config)
pub async fn run(config: HostConfig) -> Result<()> {
    let app = router(&config.server, config.filter);
    info!(
        web = %config.server.web_dir.display(),
        models = %config.server.models_dir.display(),
        "Serving filter app"
    );

    if let Some(tls_config) = &config.server.tls {
        run_https(app, &config.server.bind, tls_config).await
    } else {
        run_http(app, &config.server.bind).await
    }
}

/// Run plain HTTP server
async fn run_http(app: Router, bind: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(address = %bind, protocol = "HTTP", "Starting web server");
    axum::serve(listener, app).await?;
    Ok(())
}

/// Run HTTPS server with TLS
async fn run_https(app: Router, bind: &str, tls: &TlsConfig) -> Result<()> {
    use axum_server::tls_rustls::RustlsConfig;
    use std::path::PathBuf;

    let cert_path = PathBuf::from(&tls.cert);
    let key_path = PathBuf::from(&tls.key);

    if !cert_path.exists() {
        anyhow::bail!("TLS certificate file not found: {}", tls.cert);
    }
    if !key_path.exists() {
        anyhow::bail!("TLS key file not found: {}", tls.key);
    }

    let rustls_config = RustlsConfig::from_pem_file(&cert_path, &key_path).await?;

    let addr: std::net::SocketAddr = bind.parse()?;
    info!(address = %bind, protocol = "HTTPS", cert = %tls.cert, "Starting web server with TLS");

    axum_server::bind_rustls(addr, rustls_config)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}
