//! Upload engine: picks single-shot or resumable transfer per file and
//! drives it to completion.

mod chunked;
mod progress;
mod single;

pub use chunked::{upload_resumable, TransferState};
pub use progress::{ProgressFn, TransferProgress};

use std::path::Path;
use std::sync::Arc;

use crate::api::{DriveApi, SessionCreator};
use crate::error::{Result, UploadError};
use crate::range::validate_chunk_size;
use crate::retry::{run_with_retry, RetryPolicy};
use crate::session::RemoteItem;
use crate::source::{ChunkSource, FileChunkSource};
use crate::transport::HttpTransport;

/// Default chunk size (5 MiB, a multiple of 320 KiB).
pub const DEFAULT_CHUNK_SIZE: u64 = 5 * 1024 * 1024;
/// Files below this size go up in a single request.
pub const DEFAULT_SINGLE_UPLOAD_THRESHOLD: u64 = 5 * 1024 * 1024;

/// Per-file transfer parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadOptions {
    pub chunk_size: u64,
    pub single_upload_threshold: u64,
    pub retry: RetryPolicy,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            single_upload_threshold: DEFAULT_SINGLE_UPLOAD_THRESHOLD,
            retry: RetryPolicy::default(),
        }
    }
}

impl UploadOptions {
    pub fn validate(&self) -> Result<()> {
        validate_chunk_size(self.chunk_size)
    }
}

/// Uploads local files to remote paths. Cheap to clone; clones share the
/// transport, token cache and progress callback.
#[derive(Clone)]
pub struct Uploader {
    api: DriveApi,
    sessions: Arc<dyn SessionCreator>,
    transport: Arc<dyn HttpTransport>,
    options: UploadOptions,
    progress: Option<ProgressFn>,
}

impl Uploader {
    pub fn new(api: DriveApi, options: UploadOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            sessions: Arc::new(api.clone()),
            transport: api.transport(),
            api,
            options,
            progress: None,
        })
    }

    /// Open sessions through `sessions` instead of the drive API.
    pub fn with_session_creator(mut self, sessions: Arc<dyn SessionCreator>) -> Self {
        self.sessions = sessions;
        self
    }

    /// Report progress after every chunk of a resumable transfer.
    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn options(&self) -> &UploadOptions {
        &self.options
    }

    /// Small files (below the threshold, or smaller than one chunk) skip the
    /// session protocol.
    pub fn uses_single_shot(&self, size: u64) -> bool {
        size < self.options.single_upload_threshold || size < self.options.chunk_size
    }

    /// Upload `local` to `remote`, replacing any existing item.
    pub async fn upload_file(&self, local: &Path, remote: &str) -> Result<RemoteItem> {
        let path = local.to_path_buf();
        let source = tokio::task::spawn_blocking(move || FileChunkSource::open(&path))
            .await
            .map_err(|e| UploadError::Other(format!("open task join: {}", e)))??;
        let size = source.len();
        let policy = &self.options.retry;

        if self.uses_single_shot(size) {
            tracing::debug!(local = %local.display(), remote, size, "single-shot upload");
            return single::upload_single(&self.api, &source, remote, policy).await;
        }

        tracing::debug!(
            local = %local.display(),
            remote,
            size,
            chunk_size = self.options.chunk_size,
            "resumable upload"
        );
        let session = run_with_retry(policy, || self.sessions.create_upload_session(local, remote))
            .await?;
        if session.upload_url.is_empty() {
            return Err(UploadError::Session("session has no upload URL".into()));
        }
        upload_resumable(
            self.transport.as_ref(),
            &source,
            session,
            self.options.chunk_size,
            policy,
            self.progress.as_ref(),
        )
        .await
    }
}
