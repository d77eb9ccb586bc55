use capture_node_common::frame::CapturedFrame;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

use crate::{CameraError, FrameSource};

/// Fetches one still image per `acquire` from the camera's capture URL.
pub struct SnapshotSource {
    client: reqwest::Client,
    url: reqwest::Url,
    frames: AtomicU64,
}

impl SnapshotSource {
    pub fn new(url: &str) -> Result<Self, CameraError> {
        let url = crate::parse_url(url)?;
        let client = reqwest::Client::builder()
            .build()
            .map_err(CameraError::Connect)?;
        info!(url = %url, "snapshot frame source ready");
        Ok(Self {
            client,
            url,
            frames: AtomicU64::new(0),
        })
    }

    pub fn url(&self) -> &reqwest::Url {
        &self.url
    }
}

impl FrameSource for SnapshotSource {
    async fn acquire(&self) -> Result<CapturedFrame, CameraError> {
        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(CameraError::Connect)?;

        if !response.status().is_success() {
            return Err(CameraError::Status(response.status().as_u16()));
        }

        let jpeg = response.bytes().await.map_err(CameraError::Stream)?;
        if jpeg.is_empty() {
            return Err(CameraError::EmptyFrame);
        }

        let frame_no = self.frames.fetch_add(1, Ordering::Relaxed);
        let frame = CapturedFrame::now(jpeg.to_vec(), frame_no);
        if !frame.looks_like_jpeg() {
            warn!(frame_no, "snapshot does not start with a JPEG marker");
        }
        debug!(frame_no, bytes = frame.len(), "snapshot fetched");
        Ok(frame)
    }

    fn release(&self, frame: CapturedFrame) {
        crate::drop_frame(frame);
    }
}
