/// JPEG start-of-image marker.
pub const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];

/// One encoded image handed out by a frame source.
///
/// A frame belongs to the source that produced it until it is handed back
/// through the source's `release`, which takes it by value.
#[derive(Debug)]
pub struct CapturedFrame {
    data: Vec<u8>,
    pub captured_at_ms: i64,
    /// Source-local frame number, counted from source creation.
    pub frame_no: u64,
}

impl CapturedFrame {
    pub fn new(data: Vec<u8>, captured_at_ms: i64, frame_no: u64) -> Self {
        Self {
            data,
            captured_at_ms,
            frame_no,
        }
    }

    /// Stamp a frame with the current wall-clock time.
    pub fn now(data: Vec<u8>, frame_no: u64) -> Self {
        Self::new(data, chrono::Utc::now().timestamp_millis(), frame_no)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns true if the buffer starts with a JPEG SOI marker.
    pub fn looks_like_jpeg(&self) -> bool {
        self.data.starts_with(&JPEG_SOI)
    }
}

/// Name under which the `seq`-th capture is persisted, e.g. `/img_0.jpg`.
pub fn image_file_name(seq: u64) -> String {
    format!("/img_{seq}.jpg")
}
