//! Map upload errors to retry policy error kinds.

use crate::error::{UploadError, RETRYABLE_STATUSES};
use crate::retry::policy::ErrorKind;

/// Classify an HTTP status code for retry decisions.
pub fn classify_http_status(code: u16) -> ErrorKind {
    match code {
        429 => ErrorKind::Throttled,
        c if RETRYABLE_STATUSES.contains(&c) => ErrorKind::Http5xx(c),
        _ => ErrorKind::Other,
    }
}

/// Classify an upload error into an ErrorKind.
pub fn classify(e: &UploadError) -> ErrorKind {
    match e {
        UploadError::Network(_) => ErrorKind::Connection,
        UploadError::Http { status, .. } => classify_http_status(*status),
        _ => ErrorKind::Other,
    }
}
