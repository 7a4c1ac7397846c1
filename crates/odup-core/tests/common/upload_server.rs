//! Minimal HTTP/1.1 drive server for integration tests.
//!
//! Speaks just enough of the upload protocol: POST `...:/createUploadSession`
//! hands out a session URL, chunk PUTs to that URL append bytes and answer
//! 202 with `nextExpectedRanges` (201 with the item once complete), and PUT
//! `...:/content` stores a whole file. Chunk PUTs can be made to fail.

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;

#[derive(Debug, Default)]
struct State {
    sessions: HashMap<u32, Vec<u8>>,
    next_session: u32,
    chunk_puts: Vec<String>,
    chunk_auth_headers: usize,
    faults: HashMap<usize, u16>,
    content: HashMap<String, Vec<u8>>,
}

#[derive(Clone)]
pub struct UploadServer {
    port: u16,
    state: Arc<Mutex<State>>,
}

struct Request {
    method: String,
    path: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Request {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Starts the server in a background thread. It runs until the process exits.
pub fn start() -> UploadServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let server = UploadServer {
        port,
        state: Arc::default(),
    };
    let worker = server.clone();
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let worker = worker.clone();
            thread::spawn(move || worker.handle(stream));
        }
    });
    server
}

impl UploadServer {
    /// API root to configure the client with.
    pub fn api_base(&self) -> String {
        format!("http://127.0.0.1:{}/v1.0", self.port)
    }

    /// The `n`th chunk PUT (1-based) answers `status` once.
    pub fn fail_chunk_put(&self, n: usize, status: u16) {
        self.state.lock().unwrap().faults.insert(n, status);
    }

    pub fn received(&self, session: u32) -> Vec<u8> {
        self.state
            .lock()
            .unwrap()
            .sessions
            .get(&session)
            .cloned()
            .unwrap_or_default()
    }

    /// Content-Range of every chunk PUT, in arrival order.
    pub fn chunk_puts(&self) -> Vec<String> {
        self.state.lock().unwrap().chunk_puts.clone()
    }

    /// Chunk PUTs that carried an Authorization header.
    pub fn chunk_auth_headers(&self) -> usize {
        self.state.lock().unwrap().chunk_auth_headers
    }

    pub fn sessions_created(&self) -> u32 {
        self.state.lock().unwrap().next_session
    }

    /// Body of the single-shot PUT whose path ends with `suffix`.
    pub fn content(&self, suffix: &str) -> Option<Vec<u8>> {
        self.state
            .lock()
            .unwrap()
            .content
            .iter()
            .find(|(path, _)| path.ends_with(suffix))
            .map(|(_, body)| body.clone())
    }

    fn handle(&self, stream: TcpStream) {
        let _ = stream.set_read_timeout(Some(std::time::Duration::from_secs(5)));
        let Some(request) = read_request(&stream) else {
            return;
        };
        let (status, body) = self.route(&request);
        let reason = match status {
            200 => "OK",
            201 => "Created",
            202 => "Accepted",
            401 => "Unauthorized",
            404 => "Not Found",
            416 => "Range Not Satisfiable",
            _ => "Error",
        };
        let head = format!(
            "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            status,
            reason,
            body.len()
        );
        let mut stream = stream;
        let _ = stream.write_all(head.as_bytes());
        let _ = stream.write_all(body.as_bytes());
        let _ = stream.flush();
    }

    fn route(&self, req: &Request) -> (u16, String) {
        let mut st = self.state.lock().unwrap();
        let path = req.path.split('?').next().unwrap_or("");

        if req.method == "POST" && path.ends_with(":/createUploadSession") {
            if req.header("Authorization") != Some("Bearer integration-token") {
                return (401, r#"{"error":{"code":"unauthenticated"}}"#.into());
            }
            st.next_session += 1;
            let id = st.next_session;
            st.sessions.insert(id, Vec::new());
            let body = format!(
                r#"{{"uploadUrl":"http://127.0.0.1:{}/upload/{}","expirationDateTime":"2026-10-19T00:00:00Z","nextExpectedRanges":["0-"]}}"#,
                self.port, id
            );
            return (200, body);
        }

        if req.method == "PUT" && path.ends_with(":/content") {
            let size = req.body.len();
            st.content.insert(path.to_string(), req.body.clone());
            return (201, format!(r#"{{"id":"item-c","size":{}}}"#, size));
        }

        if req.method == "PUT" {
            if let Some(id) = path.strip_prefix("/upload/") {
                let id: u32 = id.parse().unwrap_or(0);
                return chunk(&mut st, id, req);
            }
        }
        (404, r#"{"error":{"code":"itemNotFound"}}"#.into())
    }
}

fn chunk(st: &mut State, id: u32, req: &Request) -> (u16, String) {
    let range = req.header("Content-Range").unwrap_or("").to_string();
    st.chunk_puts.push(range.clone());
    if req.header("Authorization").is_some() {
        st.chunk_auth_headers += 1;
    }
    let index = st.chunk_puts.len();
    if let Some(status) = st.faults.remove(&index) {
        return (status, r#"{"error":{"code":"injected"}}"#.into());
    }

    let Some((start, total)) = parse_content_range(&range) else {
        return (400, r#"{"error":{"code":"invalidRange"}}"#.into());
    };
    let Some(buf) = st.sessions.get_mut(&id) else {
        return (404, r#"{"error":{"code":"itemNotFound"}}"#.into());
    };
    if start as usize != buf.len() {
        return (416, r#"{"error":{"code":"invalidRange"}}"#.into());
    }
    buf.extend_from_slice(&req.body);
    let have = buf.len() as u64;
    if have >= total {
        (201, format!(r#"{{"id":"item-{}","name":"upload","size":{}}}"#, id, have))
    } else {
        (
            202,
            format!(
                r#"{{"expirationDateTime":"2026-10-19T00:00:00Z","nextExpectedRanges":["{}-"]}}"#,
                have
            ),
        )
    }
}

/// `bytes a-b/t` -> (a, t).
fn parse_content_range(v: &str) -> Option<(u64, u64)> {
    let rest = v.strip_prefix("bytes ")?;
    let (range, total) = rest.split_once('/')?;
    let (a, _) = range.split_once('-')?;
    Some((a.parse().ok()?, total.parse().ok()?))
}

fn read_request(stream: &TcpStream) -> Option<Request> {
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    reader.read_line(&mut line).ok()?;
    let mut parts = line.split_whitespace();
    let method = parts.next()?.to_string();
    let path = parts.next()?.to_string();

    let mut headers = Vec::new();
    loop {
        let mut h = String::new();
        if reader.read_line(&mut h).ok()? == 0 {
            break;
        }
        let h = h.trim_end();
        if h.is_empty() {
            break;
        }
        if let Some((k, v)) = h.split_once(':') {
            headers.push((k.trim().to_string(), v.trim().to_string()));
        }
    }

    let len = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).ok()?;
    Some(Request {
        method,
        path,
        headers,
        body,
    })
}
