//! Single-request upload for small files.

use crate::api::DriveApi;
use crate::error::Result;
use crate::retry::{run_with_retry, RetryPolicy};
use crate::session::RemoteItem;
use crate::source::{ChunkSource, FileChunkSource};

/// PUT the whole file to the item's content endpoint. Each retry re-reads the file.
pub(super) async fn upload_single(
    api: &DriveApi,
    source: &FileChunkSource,
    remote: &str,
    policy: &RetryPolicy,
) -> Result<RemoteItem> {
    let item = run_with_retry(policy, || async move {
        let body = source.read_all().await?;
        api.put_content(remote, body).await
    })
    .await?;
    tracing::info!(
        local = %source.path().display(),
        remote,
        bytes = source.len(),
        "single upload complete"
    );
    Ok(item)
}
