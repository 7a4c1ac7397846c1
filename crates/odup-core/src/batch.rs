//! Directory uploads: every regular file under a local tree goes to the
//! matching path under a remote folder, through the concurrency queue.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::api::join_remote;
use crate::engine::Uploader;
use crate::error::{Result, UploadError};
use crate::queue::{ConcurrencyQueue, QueueStats};

/// One file of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchEntry {
    pub local: PathBuf,
    pub remote: String,
    pub size: u64,
}

/// Regular files under `local_dir` (recursive, sorted by path), each mapped
/// to `remote_dir/<relative path>`. Symlinks are not followed.
pub fn collect_files(local_dir: &Path, remote_dir: &str) -> Result<Vec<BatchEntry>> {
    if !local_dir.is_dir() {
        return Err(UploadError::Validation(format!(
            "{} is not a directory",
            local_dir.display()
        )));
    }

    let mut entries = Vec::new();
    for entry in WalkDir::new(local_dir).sort_by_file_name() {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(local_dir) else {
            continue;
        };
        let rel = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
        entries.push(BatchEntry {
            local: entry.path().to_path_buf(),
            remote: join_remote(remote_dir, &rel),
            size,
        });
    }
    Ok(entries)
}

/// Upload every file under `local_dir` with at most `max_concurrency`
/// transfers in flight. Per-file failures are counted in the returned stats.
pub async fn upload_tree(
    uploader: &Uploader,
    local_dir: &Path,
    remote_dir: &str,
    max_concurrency: usize,
) -> Result<QueueStats> {
    let dir = local_dir.to_path_buf();
    let remote = remote_dir.to_string();
    let entries = tokio::task::spawn_blocking(move || collect_files(&dir, &remote))
        .await
        .map_err(|e| UploadError::Other(format!("directory walk join: {}", e)))??;

    let total_bytes: u64 = entries.iter().map(|e| e.size).sum();
    tracing::info!(
        dir = %local_dir.display(),
        files = entries.len(),
        bytes = total_bytes,
        max_concurrency,
        "starting batch upload"
    );

    let queue = ConcurrencyQueue::new(max_concurrency, entries.len());
    for entry in entries {
        let uploader = uploader.clone();
        queue.submit(async move {
            match uploader.upload_file(&entry.local, &entry.remote).await {
                Ok(item) => {
                    tracing::info!(
                        local = %entry.local.display(),
                        remote = %entry.remote,
                        id = ?item.id,
                        "uploaded"
                    );
                    Ok(())
                }
                Err(e) => {
                    tracing::warn!(
                        local = %entry.local.display(),
                        remote = %entry.remote,
                        error = %e,
                        "upload failed"
                    );
                    Err(e)
                }
            }
        });
    }
    queue.await_completion().await;

    let stats = queue.stats();
    tracing::info!(
        success = stats.success,
        failed = stats.failed,
        total = stats.total,
        "batch upload finished"
    );
    Ok(stats)
}
