use bytes::BytesMut;
use capture_node_common::frame::CapturedFrame;
use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

use crate::{CameraError, FrameSource};

const DEFAULT_BOUNDARY: &str = "frame";
const HEADER_END: &[u8] = b"\r\n\r\n";
/// Largest part (headers plus JPEG) buffered before the stream is given up on.
pub const MAX_PART_BYTES: usize = 4 * 1024 * 1024;

/// Parse state for a multipart MJPEG stream.
#[derive(Debug, Clone, Copy)]
enum ParseState {
    /// Looking for the boundary marker `--<boundary>\r\n`.
    SeekingBoundary,
    /// Found boundary, now looking for end of part headers `\r\n\r\n`.
    SeekingHeaderEnd,
    /// Collecting JPEG bytes, either a known number of them or up to the next boundary.
    CollectingJpeg { content_length: Option<usize> },
}

/// Incremental splitter for `multipart/x-mixed-replace` bodies.
///
/// Bytes are pushed in whatever chunks the network delivers; complete JPEG
/// parts come out one at a time.
pub struct PartParser {
    marker: Vec<u8>,
    buffer: BytesMut,
    state: ParseState,
    scan_from: usize,
    limit: usize,
}

impl PartParser {
    pub fn new(boundary: &str) -> Self {
        Self::with_limit(boundary, MAX_PART_BYTES)
    }

    pub fn with_limit(boundary: &str, limit: usize) -> Self {
        Self {
            marker: format!("--{boundary}\r\n").into_bytes(),
            buffer: BytesMut::with_capacity(256 * 1024),
            state: ParseState::SeekingBoundary,
            scan_from: 0,
            limit,
        }
    }

    /// Feed a chunk and return the next complete JPEG part, if one is now available.
    ///
    /// Fails once a single part would need more than the configured limit.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Option<Vec<u8>>, CameraError> {
        self.buffer.extend_from_slice(chunk);
        if let Some(jpeg) = self.next_part() {
            return Ok(Some(jpeg));
        }
        let pending = match self.state {
            ParseState::CollectingJpeg {
                content_length: Some(len),
            } => len,
            _ => self.buffer.len(),
        };
        if pending > self.limit {
            return Err(CameraError::PartTooLarge(self.limit));
        }
        Ok(None)
    }

    fn next_part(&mut self) -> Option<Vec<u8>> {
        loop {
            match self.state {
                ParseState::SeekingBoundary => {
                    if let Some(pos) = find_subsequence(&self.buffer, &self.marker) {
                        let _ = self.buffer.split_to(pos + self.marker.len());
                        self.state = ParseState::SeekingHeaderEnd;
                    } else {
                        // Keep the tail in case the marker spans chunks
                        if self.buffer.len() > self.marker.len() {
                            let _ = self.buffer.split_to(self.buffer.len() - self.marker.len());
                        }
                        return None;
                    }
                }
                ParseState::SeekingHeaderEnd => {
                    let pos = find_subsequence(&self.buffer, HEADER_END)?;
                    let headers = self.buffer.split_to(pos + HEADER_END.len());
                    let content_length = content_length(&headers[..pos]);
                    self.scan_from = 0;
                    self.state = ParseState::CollectingJpeg { content_length };
                }
                ParseState::CollectingJpeg {
                    content_length: Some(len),
                } => {
                    if self.buffer.len() < len {
                        return None;
                    }
                    let jpeg = self.buffer.split_to(len).to_vec();
                    self.state = ParseState::SeekingBoundary;
                    if !jpeg.is_empty() {
                        return Some(jpeg);
                    }
                }
                ParseState::CollectingJpeg {
                    content_length: None,
                } => {
                    let Some(pos) = find_subsequence(&self.buffer[self.scan_from..], &self.marker)
                    else {
                        // Avoid re-scanning old data on the next chunk
                        self.scan_from = self.buffer.len().saturating_sub(self.marker.len());
                        return None;
                    };
                    let jpeg_end = self.scan_from + pos;
                    // Strip trailing \r\n before the marker
                    let end = if self.buffer[..jpeg_end].ends_with(b"\r\n") {
                        jpeg_end - 2
                    } else {
                        jpeg_end
                    };
                    let jpeg = self.buffer[..end].to_vec();
                    let _ = self.buffer.split_to(jpeg_end + self.marker.len());
                    self.state = ParseState::SeekingHeaderEnd;
                    if !jpeg.is_empty() {
                        return Some(jpeg);
                    }
                }
            }
        }
    }
}

/// Pulls single frames out of an MJPEG stream.
///
/// Each `acquire` opens the stream, takes the first complete part and drops
/// the connection, so every request gets a fresh frame.
pub struct MjpegSource {
    client: reqwest::Client,
    url: reqwest::Url,
    frames: AtomicU64,
}

impl MjpegSource {
    pub fn new(url: &str) -> Result<Self, CameraError> {
        let url = crate::parse_url(url)?;
        let client = reqwest::Client::builder()
            .build()
            .map_err(CameraError::Connect)?;
        info!(url = %url, "MJPEG frame source ready");
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

impl FrameSource for MjpegSource {
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

        let boundary = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(boundary_from_content_type)
            .unwrap_or_else(|| DEFAULT_BOUNDARY.to_string());

        let mut parser = PartParser::new(&boundary);
        let mut byte_stream = response.bytes_stream();

        while let Some(chunk) = byte_stream.next().await {
            let chunk = chunk.map_err(CameraError::Stream)?;
            if let Some(jpeg) = parser.push(&chunk)? {
                let frame_no = self.frames.fetch_add(1, Ordering::Relaxed);
                let frame = CapturedFrame::now(jpeg, frame_no);
                if !frame.looks_like_jpeg() {
                    warn!(frame_no, "stream part does not start with a JPEG marker");
                }
                debug!(frame_no, bytes = frame.len(), boundary = %boundary, "frame taken from MJPEG stream");
                return Ok(frame);
            }
        }

        Err(CameraError::StreamEnded)
    }

    fn release(&self, frame: CapturedFrame) {
        crate::drop_frame(frame);
    }
}

/// Extract the `boundary` parameter of a multipart content type.
fn boundary_from_content_type(content_type: &str) -> Option<String> {
    content_type
        .split(';')
        .filter_map(|param| param.trim().split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("boundary"))
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
}

fn content_length(headers: &[u8]) -> Option<usize> {
    String::from_utf8_lossy(headers)
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse().ok())
}

/// Find the position of `needle` in `haystack`.
fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
