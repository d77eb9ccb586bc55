pub mod control;
pub mod mjpeg;
pub mod snapshot;
#[cfg(test)]
mod testing;

use capture_node_common::config::{CameraConfig, CaptureMode};
use capture_node_common::frame::CapturedFrame;
use std::future::Future;
use tracing::trace;

pub use mjpeg::MjpegSource;
pub use reqwest::Url;
pub use snapshot::SnapshotSource;

/// Something that can hand out one encoded frame at a time.
///
/// Every frame obtained from `acquire` must be given back through `release`
/// exactly once. `release` consumes the frame, so it cannot be touched
/// afterwards.
pub trait FrameSource: Send + Sync {
    fn acquire(&self) -> impl Future<Output = Result<CapturedFrame, CameraError>> + Send;

    fn release(&self, frame: CapturedFrame);
}

/// The camera source selected by `camera.mode`.
pub enum CameraSource {
    Mjpeg(MjpegSource),
    Snapshot(SnapshotSource),
}

impl CameraSource {
    pub fn from_config(config: &CameraConfig) -> Result<Self, CameraError> {
        match config.mode {
            CaptureMode::Mjpeg => Ok(Self::Mjpeg(MjpegSource::new(&config.url)?)),
            CaptureMode::Snapshot => Ok(Self::Snapshot(SnapshotSource::new(&config.url)?)),
        }
    }

    pub fn url(&self) -> &reqwest::Url {
        match self {
            Self::Mjpeg(source) => source.url(),
            Self::Snapshot(source) => source.url(),
        }
    }
}

impl FrameSource for CameraSource {
    async fn acquire(&self) -> Result<CapturedFrame, CameraError> {
        match self {
            Self::Mjpeg(source) => source.acquire().await,
            Self::Snapshot(source) => source.acquire().await,
        }
    }

    fn release(&self, frame: CapturedFrame) {
        match self {
            Self::Mjpeg(source) => source.release(frame),
            Self::Snapshot(source) => source.release(frame),
        }
    }
}

/// Network sources own a private copy of each frame, so releasing it just frees the buffer.
pub(crate) fn drop_frame(frame: CapturedFrame) {
    trace!(frame_no = frame.frame_no, bytes = frame.len(), "frame released");
}

pub(crate) fn parse_url(url: &str) -> Result<reqwest::Url, CameraError> {
    reqwest::Url::parse(url).map_err(|e| CameraError::InvalidUrl(url.to_string(), e.to_string()))
}

#[derive(Debug, thiserror::Error)]
pub enum CameraError {
    #[error("invalid camera URL {0}: {1}")]
    InvalidUrl(String, String),
    #[error("HTTP connection failed: {0}")]
    Connect(reqwest::Error),
    #[error("HTTP stream error: {0}")]
    Stream(reqwest::Error),
    #[error("HTTP status {0}")]
    Status(u16),
    #[error("camera returned an empty frame")]
    EmptyFrame,
    #[error("stream ended before a complete frame arrived")]
    StreamEnded,
    #[error("stream part exceeds {0} bytes")]
    PartTooLarge(usize),
    #[error("sensor control {name}={value} rejected with HTTP status {status}")]
    Control {
        name: &'static str,
        value: i32,
        status: u16,
    },
}
