//! HTTP transport seam.
//!
//! The engine talks to the storage service only through [`HttpTransport`] so
//! tests can swap in an in-memory fake. [`CurlTransport`] is the real one.

mod libcurl;

pub use libcurl::{CurlOptions, CurlTransport};

use async_trait::async_trait;

use crate::error::UploadError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Put,
    Post,
}

/// One outgoing request. Header names are sent as given.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpRequest {
    pub fn put(url: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            method: Method::Put,
            url: url.into(),
            headers: Vec::new(),
            body,
        }
    }

    pub fn post_json(url: impl Into<String>, body: &serde_json::Value) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: body.to_string().into_bytes(),
        }
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    /// Value of the first header named `name` (case-insensitive).
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Response with any status; callers decide what a status means.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as lossy UTF-8, for error messages.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// `Ok(self)` for 2xx, otherwise `UploadError::Http` carrying the body.
    pub fn error_for_status(self) -> Result<Self, UploadError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(UploadError::http(self.status, self.body_text()))
        }
    }
}

/// Sends requests. Failures without a response are `UploadError::Network`.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, UploadError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_builders() {
        let r = HttpRequest::put("https://up/x", vec![1, 2, 3])
            .header("Content-Length", "3")
            .header("Content-Range", "bytes 0-2/3");
        assert_eq!(r.method, Method::Put);
        assert_eq!(r.header_value("content-range"), Some("bytes 0-2/3"));
        assert_eq!(r.header_value("authorization"), None);

        let p = HttpRequest::post_json("https://api/x", &serde_json::json!({"a": 1}));
        assert_eq!(p.method, Method::Post);
        assert_eq!(p.body, br#"{"a":1}"#);
        assert_eq!(p.header_value("Content-Type"), Some("application/json"));
    }

    #[test]
    fn error_for_status() {
        let ok = HttpResponse { status: 202, body: vec![] };
        assert!(ok.error_for_status().is_ok());
        let err = HttpResponse { status: 503, body: b"busy".to_vec() }
            .error_for_status()
            .unwrap_err();
        assert_eq!(err.status(), Some(503));
        assert!(err.to_string().contains("busy"));
    }
}
