//! In-memory drive service and chunk source for unit tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{Result, UploadError};
use crate::source::ChunkSource;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, Method};

const SESSION_PREFIX: &str = "https://upload.test/session/";

#[derive(Debug, Clone)]
pub(crate) struct ChunkPut {
    pub content_range: String,
    pub content_length: String,
    pub len: u64,
}

#[derive(Default)]
struct FakeState {
    sessions: HashMap<u32, Vec<u8>>,
    next_session: u32,
    sessions_created: u32,
    chunk_puts: Vec<ChunkPut>,
    content_puts: Vec<(String, u64)>,
    faults: HashMap<usize, u16>,
    content_faults: HashMap<String, u16>,
    garbage_after: Option<usize>,
    stall: bool,
}

/// Fake resumable-upload server speaking the createUploadSession / chunk
/// PUT / content PUT protocol.
#[derive(Default)]
pub(crate) struct FakeDrive {
    state: Mutex<FakeState>,
}

impl FakeDrive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session_url(&self, id: u32) -> String {
        format!("{}{}", SESSION_PREFIX, id)
    }

    /// The `n`th chunk PUT (1-based, counting all sessions) answers `status` once.
    pub fn fail_chunk_put(&self, n: usize, status: u16) {
        self.state.lock().unwrap().faults.insert(n, status);
    }

    /// The first content PUT whose URL contains `needle` answers `status`.
    pub fn fail_content_put(&self, needle: &str, status: u16) {
        self.state
            .lock()
            .unwrap()
            .content_faults
            .insert(needle.to_string(), status);
    }

    /// The `n`th chunk PUT gets a 202 with a non-JSON body.
    pub fn garbage_after_chunk(&self, n: usize) {
        self.state.lock().unwrap().garbage_after = Some(n);
    }

    /// Never advance: always answer 202 asking for `0-`.
    pub fn stall_at_zero(&self) {
        self.state.lock().unwrap().stall = true;
    }

    /// Pretend session `id` already holds `bytes`.
    pub fn preload(&self, id: u32, bytes: &[u8]) {
        let mut st = self.state.lock().unwrap();
        st.sessions.insert(id, bytes.to_vec());
        st.next_session = st.next_session.max(id);
    }

    pub fn received(&self, id: u32) -> Vec<u8> {
        self.state
            .lock()
            .unwrap()
            .sessions
            .get(&id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn chunk_puts(&self) -> Vec<ChunkPut> {
        self.state.lock().unwrap().chunk_puts.clone()
    }

    pub fn content_puts(&self) -> Vec<(String, u64)> {
        self.state.lock().unwrap().content_puts.clone()
    }

    pub fn sessions_created(&self) -> u32 {
        self.state.lock().unwrap().sessions_created
    }

    fn handle(&self, request: &HttpRequest) -> HttpResponse {
        let mut st = self.state.lock().unwrap();
        match request.method {
            Method::Post if request.url.ends_with(":/createUploadSession") => {
                st.next_session += 1;
                st.sessions_created += 1;
                let id = st.next_session;
                st.sessions.insert(id, Vec::new());
                json(
                    200,
                    serde_json::json!({
                        "uploadUrl": format!("{}{}", SESSION_PREFIX, id),
                        "expirationDateTime": "2026-10-19T00:00:00Z",
                        "nextExpectedRanges": ["0-"],
                    }),
                )
            }
            Method::Put if request.url.contains(":/content") => {
                st.content_puts
                    .push((request.url.clone(), request.body.len() as u64));
                let hit = st
                    .content_faults
                    .keys()
                    .find(|k| request.url.contains(k.as_str()))
                    .cloned();
                if let Some(key) = hit {
                    let status = st.content_faults.remove(&key).unwrap_or(500);
                    return json(status, serde_json::json!({"error": {"code": "injected"}}));
                }
                json(
                    201,
                    serde_json::json!({
                        "id": format!("item-{}", st.content_puts.len()),
                        "size": request.body.len(),
                    }),
                )
            }
            Method::Put if request.url.starts_with(SESSION_PREFIX) => {
                self.chunk(&mut st, request)
            }
            _ => json(404, serde_json::json!({"error": {"code": "itemNotFound"}})),
        }
    }

    fn chunk(&self, st: &mut FakeState, request: &HttpRequest) -> HttpResponse {
        let content_range = request.header_value("Content-Range").unwrap_or("").to_string();
        st.chunk_puts.push(ChunkPut {
            content_range: content_range.clone(),
            content_length: request.header_value("Content-Length").unwrap_or("").to_string(),
            len: request.body.len() as u64,
        });
        let index = st.chunk_puts.len();
        if let Some(status) = st.faults.remove(&index) {
            return json(status, serde_json::json!({"error": {"code": "injected"}}));
        }
        if st.garbage_after == Some(index) {
            return HttpResponse {
                status: 202,
                body: b"<html>gateway</html>".to_vec(),
            };
        }
        if st.stall {
            return json(202, serde_json::json!({"nextExpectedRanges": ["0-"]}));
        }

        let Some((start, total)) = parse_content_range(&content_range) else {
            return json(400, serde_json::json!({"error": {"code": "invalidRange"}}));
        };
        let id: u32 = request.url[SESSION_PREFIX.len()..].parse().unwrap_or(0);
        let buf = st.sessions.entry(id).or_default();
        if start as usize > buf.len() {
            return json(416, serde_json::json!({"error": {"code": "invalidRange"}}));
        }
        buf.truncate(start as usize);
        buf.extend_from_slice(&request.body);
        let have = buf.len() as u64;
        if have >= total {
            json(201, serde_json::json!({"id": format!("item-s{}", id), "size": have}))
        } else {
            json(
                202,
                serde_json::json!({
                    "expirationDateTime": "2026-10-19T00:00:00Z",
                    "nextExpectedRanges": [format!("{}-", have)],
                }),
            )
        }
    }
}

#[async_trait]
impl HttpTransport for FakeDrive {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        Ok(self.handle(&request))
    }
}

fn json(status: u16, value: serde_json::Value) -> HttpResponse {
    HttpResponse {
        status,
        body: value.to_string().into_bytes(),
    }
}

/// `bytes a-b/t` -> (a, t).
fn parse_content_range(v: &str) -> Option<(u64, u64)> {
    let rest = v.strip_prefix("bytes ")?;
    let (range, total) = rest.split_once('/')?;
    let (a, _) = range.split_once('-')?;
    Some((a.parse().ok()?, total.parse().ok()?))
}

/// Chunk source over an in-memory buffer.
pub(crate) struct MemorySource {
    data: Vec<u8>,
}

impl MemorySource {
    /// `len` bytes of a repeating non-trivial pattern.
    pub fn patterned(len: u64) -> Self {
        Self {
            data: (0..len).map(|i| (i % 251) as u8).collect(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }
}

#[async_trait]
impl ChunkSource for MemorySource {
    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    async fn read_range(&self, start: u64, end: u64) -> Result<Vec<u8>> {
        self.data
            .get(start as usize..=end as usize)
            .map(|s| s.to_vec())
            .ok_or_else(|| {
                UploadError::Validation(format!("range {}-{} out of bounds", start, end))
            })
    }
}
