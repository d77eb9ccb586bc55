use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use capture_node_camera::FrameSource;
use capture_node_common::frame::image_file_name;
use capture_node_storage::{PersistentStore, StorageError};
use tracing::{debug, info, warn};

pub const CAMERA_FAILURE_BODY: &str = "camera access failed";

/// The single response produced for a capture request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureResponse {
    pub status: StatusCode,
    pub content_type: &'static str,
    pub body: Bytes,
}

impl CaptureResponse {
    pub fn image(jpeg: Bytes) -> Self {
        Self {
            status: StatusCode::OK,
            content_type: "image/jpeg",
            body: jpeg,
        }
    }

    pub fn camera_failure() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            content_type: "text/plain",
            body: Bytes::from_static(CAMERA_FAILURE_BODY.as_bytes()),
        }
    }
}

impl IntoResponse for CaptureResponse {
    fn into_response(self) -> Response {
        (
            self.status,
            [(header::CONTENT_TYPE, self.content_type)],
            self.body,
        )
            .into_response()
    }
}

/// Acquire, persist, respond, release.
///
/// Owns the sequence number used to name persisted images. The number is
/// consumed as soon as a non-empty frame reaches the persist stage, whether or
/// not the write succeeds, so failed writes leave gaps in the file names.
pub struct CaptureHandler<S, P> {
    source: S,
    store: P,
    next_seq: u64,
}

impl<S, P> CaptureHandler<S, P>
where
    S: FrameSource,
    P: PersistentStore,
{
    pub fn new(source: S, store: P) -> Self {
        Self::with_start_seq(source, store, 0)
    }

    pub fn with_start_seq(source: S, store: P, next_seq: u64) -> Self {
        Self {
            source,
            store,
            next_seq,
        }
    }

    /// Sequence number the next persisted image will get.
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    pub async fn handle_capture_request(&mut self) -> CaptureResponse {
        let frame = match self.source.acquire().await {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "camera access failed");
                return CaptureResponse::camera_failure();
            }
        };

        if frame.is_empty() {
            // Nothing to store, and no sequence number is spent on it
            warn!(frame_no = frame.frame_no, "image could not be saved: empty frame");
        } else {
            let seq = self.next_seq;
            self.next_seq += 1;
            let path = image_file_name(seq);
            match self.persist(&path, frame.data()).await {
                Ok(()) => info!(path = %path, seq, bytes = frame.len(), "image saved"),
                Err(e) => warn!(error = %e, path = %path, seq, "image could not be saved"),
            }
        }

        let response = CaptureResponse::image(Bytes::copy_from_slice(frame.data()));
        self.source.release(frame);
        response
    }

    async fn persist(&self, path: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let mut handle = self.store.open(path).await?;
        if let Err(e) = self.store.write(&mut handle, bytes).await {
            if let Err(close_err) = self.store.close(handle).await {
                debug!(error = %close_err, path, "close after failed write also failed");
            }
            return Err(e);
        }
        self.store.close(handle).await
    }
}
