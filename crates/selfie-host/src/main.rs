//! Selfie Host - Serves the filter web app
//!
//! Browsers only grant camera access to secure origins, so TLS is
//! available for testing from other devices on the network.

mod config;
mod server;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "selfie-host")]
#[command(about = "Serves the selfie video filter and its runtime configuration")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "selfie.toml")]
    config: PathBuf,

    /// Bind address for web server
    #[arg(short, long)]
    bind: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Directory holding the built web app
    #[arg(long)]
    web_dir: Option<PathBuf>,

    /// Directory served under /models
    #[arg(long)]
    models_dir: Option<PathBuf>,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Selfie host v{}", env!("CARGO_PKG_VERSION"));

    let mut config = config::load_config(&args.config)?;

    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(web_dir) = args.web_dir {
        config.server.web_dir = web_dir;
    }
    if let Some(models_dir) = args.models_dir {
        config.server.models_dir = models_dir;
    }

    if args.print_config {
        print!("{}", config.to_toml_string()?);
        return Ok(());
    }

    info!(
        model = %config.filter.model.default_url,
        camera = ?config.filter.camera.mode,
        fps = config.filter.capture.fps,
        "Configuration loaded"
    );

    server::run(config).await
}
