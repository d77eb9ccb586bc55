//! Fake camera and storage for handler and router tests.

use capture_node_camera::{CameraError, FrameSource};
use capture_node_common::frame::CapturedFrame;
use capture_node_storage::{PersistentStore, StorageError};
use std::collections::{BTreeMap, VecDeque};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Camera that replays a script: `Some(bytes)` yields a frame, `None` reports unavailable.
/// An exhausted script is also unavailable.
#[derive(Clone, Default)]
pub struct FakeCamera {
    inner: Arc<CameraInner>,
}

#[derive(Default)]
struct CameraInner {
    script: Mutex<VecDeque<Option<Vec<u8>>>>,
    acquired: AtomicUsize,
    released: AtomicUsize,
}

impl FakeCamera {
    pub fn scripted<I>(frames: I) -> Self
    where
        I: IntoIterator<Item = Option<&'static [u8]>>,
    {
        let camera = Self::default();
        camera
            .inner
            .script
            .lock()
            .unwrap()
            .extend(frames.into_iter().map(|f| f.map(<[u8]>::to_vec)));
        camera
    }

    pub fn acquired(&self) -> usize {
        self.inner.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.inner.released.load(Ordering::SeqCst)
    }
}

impl FrameSource for FakeCamera {
    async fn acquire(&self) -> Result<CapturedFrame, CameraError> {
        let next = self.inner.script.lock().unwrap().pop_front().flatten();
        match next {
            Some(bytes) => {
                let frame_no = self.inner.acquired.fetch_add(1, Ordering::SeqCst) as u64;
                Ok(CapturedFrame::now(bytes, frame_no))
            }
            None => Err(CameraError::Status(503)),
        }
    }

    fn release(&self, _frame: CapturedFrame) {
        self.inner.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// In-memory volume. Files become visible on close.
#[derive(Clone, Default)]
pub struct FakeStore {
    inner: Arc<StoreInner>,
}

#[derive(Default)]
struct StoreInner {
    files: Mutex<BTreeMap<String, Vec<u8>>>,
    fail_open: AtomicBool,
    fail_write: AtomicBool,
    opens: AtomicUsize,
    writes: AtomicUsize,
    closes: AtomicUsize,
}

pub struct FakeHandle {
    name: String,
    buf: Vec<u8>,
}

impl FakeStore {
    pub fn failing_open() -> Self {
        let store = Self::default();
        store.inner.fail_open.store(true, Ordering::SeqCst);
        store
    }

    pub fn failing_write() -> Self {
        let store = Self::default();
        store.inner.fail_write.store(true, Ordering::SeqCst);
        store
    }

    pub fn set_fail_open(&self, fail: bool) {
        self.inner.fail_open.store(fail, Ordering::SeqCst);
    }

    pub fn file(&self, name: &str) -> Option<Vec<u8>> {
        self.inner.files.lock().unwrap().get(name).cloned()
    }

    pub fn file_names(&self) -> Vec<String> {
        self.inner.files.lock().unwrap().keys().cloned().collect()
    }

    pub fn opens(&self) -> usize {
        self.inner.opens.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.inner.writes.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.inner.closes.load(Ordering::SeqCst)
    }
}

impl PersistentStore for FakeStore {
    type Handle = FakeHandle;

    async fn open(&self, name: &str) -> Result<FakeHandle, StorageError> {
        self.inner.opens.fetch_add(1, Ordering::SeqCst);
        if self.inner.fail_open.load(Ordering::SeqCst) {
            return Err(StorageError::Open(
                name.to_string(),
                io::Error::other("card removed"),
            ));
        }
        Ok(FakeHandle {
            name: name.to_string(),
            buf: Vec::new(),
        })
    }

    async fn write(&self, handle: &mut FakeHandle, bytes: &[u8]) -> Result<(), StorageError> {
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        if self.inner.fail_write.load(Ordering::SeqCst) {
            return Err(StorageError::Write(
                handle.name.clone(),
                io::Error::other("no space left on card"),
            ));
        }
        handle.buf.extend_from_slice(bytes);
        Ok(())
    }

    async fn close(&self, handle: FakeHandle) -> Result<(), StorageError> {
        self.inner.closes.fetch_add(1, Ordering::SeqCst);
        if !self.inner.fail_write.load(Ordering::SeqCst) {
            self.inner
                .files
                .lock()
                .unwrap()
                .insert(handle.name, handle.buf);
        }
        Ok(())
    }
}

/// Serve a single raw HTTP response on a local port; returns `http://<addr>`.
pub async fn serve_once(response: Vec<u8>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = [0u8; 1024];
        let _ = socket.read(&mut request).await;
        socket.write_all(&response).await.unwrap();
        let _ = socket.shutdown().await;
    });
    format!("http://{addr}")
}

/// A `200 image/jpeg` response carrying `body`.
pub fn jpeg_response(body: &[u8]) -> Vec<u8> {
    let mut out = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    )
    .into_bytes();
    out.extend_from_slice(body);
    out
}
