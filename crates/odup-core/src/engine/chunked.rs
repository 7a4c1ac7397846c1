//! Resumable chunked transfer: one file, chunk by chunk, against a live
//! upload session.

use std::time::Instant;

use super::progress::{ProgressFn, TransferProgress};
use crate::error::{Result, UploadError};
use crate::range::{compute_range, ByteRange};
use crate::retry::{run_with_retry, RetryPolicy};
use crate::session::{RemoteItem, UploadSession};
use crate::source::ChunkSource;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport};

/// Consecutive chunks the server may answer without moving its expected
/// offset forward before we give up on the session.
const MAX_STALLED_CHUNKS: u32 = 3;

/// Where one file transfer stands.
#[derive(Debug)]
pub enum TransferState {
    /// More bytes to send under this session.
    Active(UploadSession),
    /// Server returned the finished item.
    Completed(RemoteItem),
    /// Unretryable error or retries exhausted.
    Failed(UploadError),
}

/// Drive `source` to completion under `session`, sending chunks strictly in
/// order. Each chunk PUT goes through `policy`; retries re-read the range.
pub async fn upload_resumable(
    transport: &dyn HttpTransport,
    source: &dyn ChunkSource,
    session: UploadSession,
    chunk_size: u64,
    policy: &RetryPolicy,
    progress: Option<&ProgressFn>,
) -> Result<RemoteItem> {
    let total = source.len();
    let mut state = TransferState::Active(session);
    let mut last_start: Option<u64> = None;
    let mut stalled = 0u32;
    let mut chunks = 0u32;

    loop {
        state = match state {
            TransferState::Completed(item) => {
                tracing::info!(bytes = total, chunks, "resumable upload complete");
                return Ok(item);
            }
            TransferState::Failed(e) => {
                tracing::warn!(error = %e, chunks, "resumable upload failed");
                return Err(e);
            }
            TransferState::Active(session) => match compute_range(total, chunk_size, &session) {
                Err(e) => TransferState::Failed(e),
                Ok(range) => {
                    let repeated = last_start.is_some_and(|prev| range.start <= prev);
                    stalled = if repeated { stalled + 1 } else { 0 };
                    if stalled >= MAX_STALLED_CHUNKS {
                        TransferState::Failed(UploadError::Session(format!(
                            "server keeps asking for offset {} after {} chunks",
                            range.start, stalled
                        )))
                    } else {
                        last_start = Some(range.start);
                        chunks += 1;
                        send_chunk(transport, source, session, range, total, policy, progress)
                            .await
                    }
                }
            },
        };
    }
}

/// One iteration: PUT `range`, then move to the next state.
async fn send_chunk(
    transport: &dyn HttpTransport,
    source: &dyn ChunkSource,
    mut session: UploadSession,
    range: ByteRange,
    total: u64,
    policy: &RetryPolicy,
    progress: Option<&ProgressFn>,
) -> TransferState {
    let url = session.upload_url.as_str();
    tracing::debug!(
        start = range.start,
        end = range.end,
        total,
        "sending chunk"
    );

    let started = Instant::now();
    let result = run_with_retry(policy, || async move {
        let body = source.read_range(range.start, range.end).await?;
        let request = HttpRequest::put(url, body)
            .header("Content-Length", range.size().to_string())
            .header("Content-Range", range.content_range(total));
        transport.send(request).await?.error_for_status()
    })
    .await;
    let elapsed = started.elapsed();

    let response: HttpResponse = match result {
        Ok(r) => r,
        Err(e) => return TransferState::Failed(e),
    };

    if let Some(cb) = progress {
        cb(&TransferProgress::after_chunk(range.end + 1, total, range.size(), elapsed));
    }

    match response.status {
        200 | 201 => match RemoteItem::from_response(&response.body) {
            Ok(item) => TransferState::Completed(item),
            Err(e) => TransferState::Failed(e),
        },
        _ => match session.replace_from_chunk_response(&response.body) {
            Ok(()) => TransferState::Active(session),
            Err(e) => TransferState::Failed(e),
        },
    }
}
