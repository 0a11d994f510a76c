use std::process;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use faasnet::cli::Args;
use faasnet::config::load_config_file;
use faasnet::server::{create_router, AppState};
use faasnet::telemetry::spawn_refresher;

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize logging
    let filter = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();

    // Load .env file if specified
    if let Some(ref env_file) = args.env_file {
        if let Err(e) = dotenvy::from_path(env_file) {
            error!("Failed to load env file {}: {}", env_file.display(), e);
            process::exit(1);
        }
    }

    let state = AppState::new(Duration::from_secs(args.poll_timeout));

    // Optional startup configuration; otherwise the service waits for the
    // first POST /faas upload
    if let Some(ref config_file) = args.config {
        match load_config_file(config_file) {
            Ok(registry) => {
                state.install_registry(registry).await;
                state.mark_configured();
                info!("Loaded startup configuration from {}", config_file.display());
            }
            Err(e) => {
                error!(
                    "Failed to load configuration file {}: {}",
                    config_file.display(),
                    e
                );
                process::exit(1);
            }
        }
    }

    spawn_refresher(state.clone());

    let addr = format!("{}:{}", args.bind_addr, args.port);
    info!("Starting faasnet on {}", addr);

    let app = create_router(state);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            process::exit(1);
        }
    };

    info!("Server listening on {}", addr);
    info!("Endpoints:");
    info!("  GET  /faas?function_name=<name> - Best URL for a function");
    info!("  POST /faas                      - Upload a configuration");
    info!("  GET  /health                    - Health check");
    info!("  GET  /status                    - Service status");

    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
        process::exit(1);
    }
}
