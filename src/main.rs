//! trellisd binary entrypoint.

use std::path::Path;
use tracing::{error, info};
use trellisd::config::{Config, LogFormat};
use trellisd::hub::Hub;
use trellisd::{http, metrics};

/// Resolve the configuration path from CLI arguments.
/// Supports `-c <path>`, `--config <path>`, or a bare path.
/// Falls back to `trellisd.toml` when no argument is provided.
fn resolve_config_path() -> String {
    let mut args = std::env::args().skip(1);

    let raw_path = match args.next() {
        Some(flag) if flag == "-c" || flag == "--config" => args.next().unwrap_or_else(|| {
            eprintln!("Missing path after {}", flag);
            std::process::exit(1);
        }),
        Some(path) => path,
        None => "trellisd.toml".to_string(),
    };

    match std::fs::canonicalize(Path::new(&raw_path)) {
        Ok(p) => p.to_string_lossy().into_owned(),
        Err(_) => raw_path,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration first (before tracing, so we can use log_format).
    // A missing file runs on defaults, which suits local development.
    let config_path = resolve_config_path();
    let config = if Path::new(&config_path).exists() {
        Config::load(&config_path).map_err(|e| {
            eprintln!("ERROR: Failed to load config from {}: {}", config_path, e);
            e
        })?
    } else {
        eprintln!("Config {} not found, using defaults", config_path);
        Config::default()
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    match config.server.log_format {
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(true)
                .json()
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(true)
                .init();
        }
    }

    if let Err(errors) = trellisd::config::validate(&config) {
        for err in &errors {
            error!(error = %err, "Configuration validation failed");
        }
        return Err(anyhow::anyhow!(
            "Configuration validation failed with {} error(s)",
            errors.len()
        ));
    }

    info!(listen = %config.server.listen, "Starting trellisd");

    metrics::init();

    let listen = config.server.listen.clone();
    let hub = Hub::connect(config).await?;

    let listener = tokio::net::TcpListener::bind(&listen).await?;
    http::serve(hub, listener, async {
        let _ = tokio::signal::ctrl_c().await;
        info!("Shutdown signal received");
    })
    .await?;

    info!("trellisd stopped");
    Ok(())
}
