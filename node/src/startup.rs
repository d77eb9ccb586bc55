//! Bring-up phases that must succeed before the node serves requests:
//! network link, camera init and storage mount. Any failure stops startup.

use std::net::SocketAddr;
use std::time::Duration;

use capture_node_camera::control::SensorControl;
use capture_node_camera::{CameraError, CameraSource, FrameSource, Url};
use capture_node_common::config::{CameraConfig, Config, NetworkConfig};
use capture_node_storage::{StorageError, VolumeStore};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info};

use crate::handler::CaptureHandler;
use crate::server;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("camera host unreachable after {attempts} attempts: {last}")]
    Network { attempts: u32, last: String },
    #[error("camera init failed: {0}")]
    Camera(#[from] CameraError),
    #[error("storage mount failed: {0}")]
    Storage(#[from] StorageError),
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },
    #[error("server error: {0}")]
    Serve(std::io::Error),
}

/// Run every startup phase, then serve `GET /capture` until the listener fails.
pub async fn run(config: Config) -> Result<(), StartupError> {
    let source = CameraSource::from_config(&config.camera)?;
    let local_addr = await_network(source.url(), &config.network).await?;
    info!(local_addr = %local_addr.ip(), "network connected");

    init_camera(&source, &config.camera).await?;

    let store = VolumeStore::mount(&config.storage).await?;

    let app = server::router(CaptureHandler::new(source, store));
    let addr = format!("{}:{}", config.server.bind, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| StartupError::Bind {
            addr: addr.clone(),
            source,
        })?;
    info!(addr = %addr, "web server ready: /capture");

    axum::serve(listener, app).await.map_err(StartupError::Serve)
}

/// Wait until the camera host accepts TCP connections, trying at most
/// `connect_attempts` times. Returns the local address of the working link.
pub async fn await_network(url: &Url, config: &NetworkConfig) -> Result<SocketAddr, StartupError> {
    let host = url.host_str().ok_or_else(|| StartupError::Network {
        attempts: 0,
        last: format!("{url} has no host"),
    })?;
    let port = url.port_or_known_default().unwrap_or(80);
    let delay = Duration::from_millis(config.retry_delay_ms);
    let mut last = String::new();

    info!(host, port, attempts = config.connect_attempts, "connecting to network");
    for attempt in 1..=config.connect_attempts {
        match TcpStream::connect((host, port)).await {
            Ok(stream) => match stream.local_addr() {
                Ok(local) => {
                    debug!(attempt, "camera host reachable");
                    return Ok(local);
                }
                Err(e) => last = e.to_string(),
            },
            Err(e) => {
                debug!(attempt, error = %e, "camera host not reachable yet");
                last = e.to_string();
            }
        }
        if attempt < config.connect_attempts {
            tokio::time::sleep(delay).await;
        }
    }

    Err(StartupError::Network {
        attempts: config.connect_attempts,
        last,
    })
}

/// Push sensor settings (when a control URL is configured) and prove the
/// camera can deliver a frame.
pub async fn init_camera<S: FrameSource>(
    source: &S,
    config: &CameraConfig,
) -> Result<(), StartupError> {
    match &config.control_url {
        Some(control_url) => {
            SensorControl::new(control_url)?
                .apply(&config.sensor)
                .await?
        }
        None => info!("no camera control URL, sensor settings left as they are"),
    }

    let probe = source.acquire().await?;
    info!(bytes = probe.len(), jpeg = probe.looks_like_jpeg(), "camera ready");
    source.release(probe);
    Ok(())
}
