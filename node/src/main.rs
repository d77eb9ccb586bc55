use capture_node::startup;
use capture_node_common::config::Config;
use std::path::PathBuf;
use tracing::{error, info};

// Captures are handled one at a time on a single thread.
#[tokio::main(flavor = "current_thread")]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    let config = match Config::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {e}", config_path.display());
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.parse().unwrap_or_default()),
        )
        .init();

    info!(
        camera_url = %config.camera.url,
        mode = ?config.camera.mode,
        storage_root = %config.storage.root.display(),
        port = config.server.port,
        "starting capture node"
    );

    if let Err(e) = startup::run(config).await {
        error!(error = %e, "capture node stopped");
        std::process::exit(1);
    }
}
