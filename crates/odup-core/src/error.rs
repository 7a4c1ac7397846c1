//! Upload error type.
//!
//! Every failure is tagged with its kind where it happens (transport, HTTP
//! status check, range math, response parsing) so the retry policy can
//! classify it without re-deriving anything from message text.

use thiserror::Error;

/// HTTP statuses worth retrying: throttling and transient server failures.
pub const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Substrings that mark a free-form transport failure as transient.
const TRANSIENT_MARKERS: [&str; 6] = [
    "fetch failed",
    "network",
    "connection reset",
    "econnreset",
    "timed out",
    "timeout",
];

#[derive(Debug, Error)]
pub enum UploadError {
    /// Bad configuration or precondition (chunk size, file too small for chunking).
    #[error("validation: {0}")]
    Validation(String),
    /// Server answered with a non-2xx status.
    #[error("HTTP {status}{}", fmt_body(.body))]
    Http { status: u16, body: String },
    /// No response received (connect, DNS, reset, timeout).
    #[error("network: {0}")]
    Network(String),
    /// Response parsed as neither a finished item nor a valid upload session.
    #[error("upload session: {0}")]
    Session(String),
    /// Access token could not be obtained.
    #[error("auth: {0}")]
    Auth(String),
    /// Local file could not be read.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Other(String),
}

fn fmt_body(body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        String::new()
    } else {
        format!(": {}", truncate(body, 256))
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

impl UploadError {
    pub fn http(status: u16, body: impl Into<String>) -> Self {
        UploadError::Http {
            status,
            body: body.into(),
        }
    }

    /// Status code if this is an HTTP error.
    pub fn status(&self) -> Option<u16> {
        match self {
            UploadError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True if another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            UploadError::Network(_) => true,
            UploadError::Http { status, .. } => RETRYABLE_STATUSES.contains(status),
            UploadError::Validation(_)
            | UploadError::Session(_)
            | UploadError::Auth(_)
            | UploadError::Io(_)
            | UploadError::Other(_) => false,
        }
    }

    /// Tag an untyped failure description coming from a collaborator that only
    /// reports text. Transient transport wording becomes `Network`, an embedded
    /// status code becomes `Http`, anything else stays `Other` (fatal).
    pub fn from_transport_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_ascii_lowercase();
        if TRANSIENT_MARKERS.iter().any(|m| lower.contains(m)) {
            return UploadError::Network(message);
        }
        if let Some(status) = embedded_status(&lower) {
            return UploadError::Http {
                status,
                body: message,
            };
        }
        UploadError::Other(message)
    }
}

/// Find a status code written as "http 503", "status 503", "status: 503" or
/// "status code 503".
fn embedded_status(lower: &str) -> Option<u16> {
    for marker in ["status code", "status", "http"] {
        let mut rest = lower;
        while let Some(pos) = rest.find(marker) {
            let after = &rest[pos + marker.len()..];
            let digits: String = after
                .trim_start_matches(|c: char| c == ':' || c == ' ' || c == '=')
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect();
            if digits.len() == 3 {
                if let Ok(code) = digits.parse::<u16>() {
                    if (100..=599).contains(&code) {
                        return Some(code);
                    }
                }
            }
            rest = after;
        }
    }
    None
}

impl From<serde_json::Error> for UploadError {
    fn from(err: serde_json::Error) -> Self {
        UploadError::Session(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, UploadError>;
