use capture_node_common::config::StorageConfig;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use sysinfo::Disks;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

const PROBE_FILE: &str = ".capture-node-probe";

/// A volume that accepts named byte buffers.
///
/// Writing is a three-step open/write/close sequence so callers can tell
/// which step failed.
pub trait PersistentStore: Send + Sync {
    type Handle: Send;

    fn open(&self, name: &str) -> impl Future<Output = Result<Self::Handle, StorageError>> + Send;

    fn write(
        &self,
        handle: &mut Self::Handle,
        bytes: &[u8],
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    fn close(&self, handle: Self::Handle) -> impl Future<Output = Result<(), StorageError>> + Send;
}

/// Files under the mount point of a storage volume (e.g. an SD card).
#[derive(Debug)]
pub struct VolumeStore {
    root: PathBuf,
}

/// An open file on a [`VolumeStore`].
#[derive(Debug)]
pub struct VolumeFile {
    path: PathBuf,
    file: tokio::fs::File,
    written: usize,
}

impl VolumeStore {
    pub async fn mount(config: &StorageConfig) -> Result<Self, StorageError> {
        Self::mount_at(&config.root).await
    }

    /// Check that `root` is a writable directory and log how much space it has.
    pub async fn mount_at(root: &Path) -> Result<Self, StorageError> {
        let mount_err = |e: io::Error| StorageError::Mount(root.display().to_string(), e);

        let meta = tokio::fs::metadata(root).await.map_err(mount_err)?;
        if !meta.is_dir() {
            return Err(mount_err(io::Error::other("not a directory")));
        }

        let probe = root.join(PROBE_FILE);
        tokio::fs::write(&probe, b"probe").await.map_err(mount_err)?;
        if let Err(e) = tokio::fs::remove_file(&probe).await {
            warn!(error = %e, path = %probe.display(), "failed to remove storage probe file");
        }

        let root = root.to_path_buf();
        let space_root = root.clone();
        match tokio::task::spawn_blocking(move || disk_space(&space_root)).await {
            Ok(Some((available, total))) => info!(
                root = %root.display(),
                available_mb = available / 1_048_576,
                total_mb = total / 1_048_576,
                "storage volume ready"
            ),
            Ok(None) => info!(root = %root.display(), "storage volume ready"),
            Err(e) => {
                warn!(error = %e, "spawn_blocking failed");
                info!(root = %root.display(), "storage volume ready");
            }
        }

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a volume-absolute name like `/img_3.jpg` onto the mount point.
    pub fn resolve(&self, name: &str) -> PathBuf {
        self.root.join(name.trim_start_matches('/'))
    }
}

impl PersistentStore for VolumeStore {
    type Handle = VolumeFile;

    async fn open(&self, name: &str) -> Result<VolumeFile, StorageError> {
        let path = self.resolve(name);
        let file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| StorageError::Open(path.display().to_string(), e))?;
        Ok(VolumeFile {
            path,
            file,
            written: 0,
        })
    }

    async fn write(&self, handle: &mut VolumeFile, bytes: &[u8]) -> Result<(), StorageError> {
        handle
            .file
            .write_all(bytes)
            .await
            .map_err(|e| StorageError::Write(handle.path.display().to_string(), e))?;
        handle.written += bytes.len();
        Ok(())
    }

    async fn close(&self, mut handle: VolumeFile) -> Result<(), StorageError> {
        let close_err = |e: io::Error| StorageError::Close(handle.path.display().to_string(), e);
        handle.file.flush().await.map_err(close_err)?;
        handle.file.sync_all().await.map_err(close_err)?;
        debug!(path = %handle.path.display(), bytes = handle.written, "file closed");
        Ok(())
    }
}

/// (available, total) bytes of the disk whose mount point best matches `path`.
fn disk_space(path: &Path) -> Option<(u64, u64)> {
    let path = std::fs::canonicalize(path).ok()?;
    let disks = Disks::new_with_refreshed_list();
    disks
        .list()
        .iter()
        .filter(|disk| path.starts_with(disk.mount_point()))
        .max_by_key(|disk| disk.mount_point().as_os_str().len())
        .map(|disk| (disk.available_space(), disk.total_space()))
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("failed to open {0} for writing: {1}")]
    Open(String, io::Error),
    #[error("failed to write {0}: {1}")]
    Write(String, io::Error),
    #[error("failed to close {0}: {1}")]
    Close(String, io::Error),
    #[error("storage volume {0} is not usable: {1}")]
    Mount(String, io::Error),
}
