//! Upload session and remote item wire types.

use serde::{Deserialize, Serialize};

use crate::error::{Result, UploadError};

/// Server-issued resumable upload handle.
///
/// `next_expected_ranges` lists byte ranges still wanted, as `"start-end"`
/// strings (end may be blank). Only the first entry drives the next chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSession {
    #[serde(default)]
    pub upload_url: String,
    #[serde(default)]
    pub expiration_date_time: Option<String>,
    #[serde(default)]
    pub next_expected_ranges: Vec<String>,
}

impl UploadSession {
    /// Parse a fresh session from a createUploadSession response.
    pub fn from_create_response(body: &[u8]) -> Result<Self> {
        let session: UploadSession = serde_json::from_slice(body)?;
        if session.upload_url.is_empty() {
            return Err(UploadError::Session(
                "createUploadSession response has no uploadUrl".to_string(),
            ));
        }
        Ok(session)
    }

    /// Replace this session with the one in an intermediate chunk response.
    ///
    /// Servers usually send only `nextExpectedRanges` and `expirationDateTime`
    /// here; the upload URL is kept when the new body omits it.
    pub fn replace_from_chunk_response(&mut self, body: &[u8]) -> Result<()> {
        let value: serde_json::Value = serde_json::from_slice(body)
            .map_err(|e| UploadError::Session(format!("chunk response is not JSON: {}", e)))?;
        if !value.is_object() || value.get("nextExpectedRanges").is_none() {
            return Err(UploadError::Session(format!(
                "chunk response is not an upload session: {}",
                value
            )));
        }
        let mut next: UploadSession = serde_json::from_value(value)?;
        if next.upload_url.is_empty() {
            next.upload_url = std::mem::take(&mut self.upload_url);
        }
        *self = next;
        Ok(())
    }
}

/// Final object descriptor returned when the upload completes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteItem {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    /// Remaining fields, kept verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl RemoteItem {
    pub fn from_response(body: &[u8]) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_slice(body)
            .map_err(|e| UploadError::Session(format!("item response is not JSON: {}", e)))?;
        if !value.is_object() {
            return Err(UploadError::Session(format!(
                "item response is not an object: {}",
                value
            )));
        }
        Ok(serde_json::from_value(value)?)
    }
}
