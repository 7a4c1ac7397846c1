//! Byte-addressable read access to the local file being uploaded.
//!
//! Reads are positioned (pread on Unix), so the same range can be read again
//! when a chunk PUT is retried.

use async_trait::async_trait;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
#[cfg(unix)]
use std::os::unix::fs::FileExt;

use crate::error::{Result, UploadError};

/// Repeatable random-access reads over an upload's content.
#[async_trait]
pub trait ChunkSource: Send + Sync {
    /// Total size in bytes.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read the inclusive range `[start, end]`.
    async fn read_range(&self, start: u64, end: u64) -> Result<Vec<u8>>;
}

/// Read-only handle on a local file; one per transfer.
#[derive(Clone, Debug)]
pub struct FileChunkSource {
    file: Arc<File>,
    path: PathBuf,
    len: u64,
}

impl FileChunkSource {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(FileChunkSource {
            file: Arc::new(file),
            path: path.to_path_buf(),
            len,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whole file content (single-shot uploads).
    pub async fn read_all(&self) -> Result<Vec<u8>> {
        if self.len == 0 {
            return Ok(Vec::new());
        }
        self.read_range(0, self.len - 1).await
    }
}

#[async_trait]
impl ChunkSource for FileChunkSource {
    fn len(&self) -> u64 {
        self.len
    }

    async fn read_range(&self, start: u64, end: u64) -> Result<Vec<u8>> {
        if end < start || end >= self.len {
            return Err(UploadError::Validation(format!(
                "read range {}-{} outside file of {} bytes",
                start, end, self.len
            )));
        }
        let file = Arc::clone(&self.file);
        let size = (end - start + 1) as usize;
        tokio::task::spawn_blocking(move || read_at(&file, start, size))
            .await
            .map_err(|e| UploadError::Other(format!("read task join: {}", e)))?
    }
}

#[cfg(unix)]
fn read_at(file: &File, offset: u64, size: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; size];
    file.read_exact_at(&mut buf, offset)?;
    Ok(buf)
}

/// Non-Unix: seek + read on a cloned handle.
#[cfg(not(unix))]
fn read_at(file: &File, offset: u64, size: usize) -> Result<Vec<u8>> {
    use std::io::{Read, Seek, SeekFrom};
    let mut f = file.try_clone()?;
    f.seek(SeekFrom::Start(offset))?;
    let mut buf = vec![0u8; size];
    f.read_exact(&mut buf)?;
    Ok(buf)
}
