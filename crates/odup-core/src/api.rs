//! Drive API endpoints used by the uploader: upload-session creation and
//! single-request content upload.

use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use std::path::Path;
use std::sync::Arc;

use crate::auth::AuthProvider;
use crate::error::{Result, UploadError};
use crate::session::{RemoteItem, UploadSession};
use crate::transport::{HttpRequest, HttpResponse, HttpTransport};

/// Default Graph API root.
pub const DEFAULT_API_BASE: &str = "https://graph.microsoft.com/v1.0";

/// Characters escaped inside one remote path segment.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b':')
    .add(b'/')
    .add(b'\\');

/// Opens resumable upload sessions for a remote path.
#[async_trait]
pub trait SessionCreator: Send + Sync {
    async fn create_upload_session(&self, local: &Path, remote: &str) -> Result<UploadSession>;
}

/// Client for the drive's item endpoints.
#[derive(Clone)]
pub struct DriveApi {
    base: String,
    transport: Arc<dyn HttpTransport>,
    auth: Arc<dyn AuthProvider>,
}

impl DriveApi {
    pub fn new(base: &str, transport: Arc<dyn HttpTransport>, auth: Arc<dyn AuthProvider>) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
            transport,
            auth,
        }
    }

    pub fn transport(&self) -> Arc<dyn HttpTransport> {
        Arc::clone(&self.transport)
    }

    /// Send an authorized request. A 401 drops the cached token so the next
    /// call fetches a new one.
    async fn send_authorized(&self, request: HttpRequest) -> Result<HttpResponse> {
        let response = self.transport.send(request).await?;
        if response.status == 401 {
            tracing::debug!("access token rejected, dropping it");
            self.auth.invalidate();
        }
        response.error_for_status()
    }

    /// `{base}/me/drive/root:/{encoded remote path}:/{action}`.
    pub fn item_url(&self, remote: &str, action: &str) -> String {
        format!("{}/me/drive/root:/{}:/{}", self.base, encode_remote_path(remote), action)
    }

    /// PUT the whole body to the item's content endpoint (replacing any existing item).
    pub async fn put_content(&self, remote: &str, body: Vec<u8>) -> Result<RemoteItem> {
        let token = self.auth.access_token().await?;
        let len = body.len();
        let url = format!(
            "{}?@microsoft.graph.conflictBehavior=replace",
            self.item_url(remote, "content")
        );
        let request = HttpRequest::put(url, body)
            .header("Authorization", format!("Bearer {}", token))
            .header("Content-Type", "application/octet-stream")
            .header("Content-Length", len.to_string());
        let response = self.send_authorized(request).await?;
        RemoteItem::from_response(&response.body)
    }
}

#[async_trait]
impl SessionCreator for DriveApi {
    async fn create_upload_session(&self, local: &Path, remote: &str) -> Result<UploadSession> {
        let token = self.auth.access_token().await?;
        let body = serde_json::json!({
            "item": { "@microsoft.graph.conflictBehavior": "replace" }
        });
        let request = HttpRequest::post_json(self.item_url(remote, "createUploadSession"), &body)
            .header("Authorization", format!("Bearer {}", token));
        let response = self.send_authorized(request).await?;
        let session = UploadSession::from_create_response(&response.body)?;
        tracing::debug!(
            local = %local.display(),
            remote,
            expires = ?session.expiration_date_time,
            "upload session created"
        );
        Ok(session)
    }
}

/// Percent-encode each segment of a remote path; empty segments dropped.
pub fn encode_remote_path(remote: &str) -> String {
    remote
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| utf8_percent_encode(s, SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

/// Join a remote directory and a relative path with single slashes.
pub fn join_remote(dir: &str, rel: &str) -> String {
    let dir = dir.trim_end_matches('/');
    let rel = rel.trim_start_matches('/');
    if dir.is_empty() {
        rel.to_string()
    } else {
        format!("{}/{}", dir, rel)
    }
}

/// Check that `base` is an absolute http(s) URL.
pub fn validate_api_base(base: &str) -> Result<()> {
    let url = url::Url::parse(base)
        .map_err(|e| UploadError::Validation(format!("invalid api_base {:?}: {}", base, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(UploadError::Validation(format!(
            "api_base must be http(s), got {:?}",
            other
        ))),
    }
}
