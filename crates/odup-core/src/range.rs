//! Chunk range math for resumable uploads.
//!
//! Computes the next byte range to PUT from the file size, the configured
//! chunk size and the ranges the server says it still expects.

use crate::error::{Result, UploadError};
use crate::session::UploadSession;

/// Chunk sizes must be a multiple of 320 KiB.
pub const CHUNK_GRANULARITY: u64 = 327_680;
/// Smallest allowed chunk (320 KiB).
pub const MIN_CHUNK_SIZE: u64 = CHUNK_GRANULARITY;
/// Largest allowed chunk (50 MiB).
pub const MAX_CHUNK_SIZE: u64 = 52_428_800;

/// Inclusive byte range `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Number of bytes in the range.
    pub fn size(&self) -> u64 {
        self.end - self.start + 1
    }

    /// `Content-Range` header value: `bytes start-end/total`.
    pub fn content_range(&self, total: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, total)
    }
}

/// Check that `chunk_size` is within protocol bounds and on the 320 KiB grid.
pub fn validate_chunk_size(chunk_size: u64) -> Result<()> {
    if !(MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&chunk_size) {
        return Err(UploadError::Validation(format!(
            "chunk size {} outside [{}, {}]",
            chunk_size, MIN_CHUNK_SIZE, MAX_CHUNK_SIZE
        )));
    }
    if chunk_size % CHUNK_GRANULARITY != 0 {
        return Err(UploadError::Validation(format!(
            "chunk size {} is not a multiple of {}",
            chunk_size, CHUNK_GRANULARITY
        )));
    }
    Ok(())
}

/// Next range to send for `session`.
///
/// Only the first expected range is used; later entries are ignored so that
/// chunks always go out in order from the lowest outstanding offset.
pub fn compute_range(
    file_size: u64,
    chunk_size: u64,
    session: &UploadSession,
) -> Result<ByteRange> {
    validate_chunk_size(chunk_size)?;
    if file_size < chunk_size {
        return Err(UploadError::Validation(format!(
            "file size {} is smaller than chunk size {}; use a single upload",
            file_size, chunk_size
        )));
    }

    let Some(first) = session.next_expected_ranges.first() else {
        return Ok(ByteRange {
            start: 0,
            end: chunk_size - 1,
        });
    };

    let (start, end) = parse_expected(first, chunk_size)?;
    if start >= file_size {
        return Err(UploadError::Session(format!(
            "expected range {:?} starts past end of file ({} bytes)",
            first, file_size
        )));
    }
    let end = end.min(start + chunk_size - 1).min(file_size - 1);
    if end < start {
        return Err(UploadError::Session(format!("expected range {:?} is empty", first)));
    }
    Ok(ByteRange { start, end })
}

/// Parse `"start-end"`; blank start is 0, blank end is one chunk past start.
fn parse_expected(raw: &str, chunk_size: u64) -> Result<(u64, u64)> {
    let bad = || UploadError::Session(format!("malformed expected range {:?}", raw));
    let (a, b) = raw.trim().split_once('-').ok_or_else(bad)?;
    let (a, b) = (a.trim(), b.trim());
    let start = if a.is_empty() { 0 } else { a.parse::<u64>().map_err(|_| bad())? };
    let end = if b.is_empty() {
        start.saturating_add(chunk_size - 1)
    } else {
        b.parse::<u64>().map_err(|_| bad())?
    };
    Ok((start, end))
}
