//! libcurl-backed transport.
//!
//! Each request runs a blocking `Easy` transfer on the tokio blocking pool.

use async_trait::async_trait;
use std::io::Read;
use std::time::Duration;

use super::{HttpRequest, HttpResponse, HttpTransport, Method};
use crate::error::UploadError;

/// Timeouts and limits applied to every transfer.
#[derive(Debug, Clone, Copy)]
pub struct CurlOptions {
    pub connect_timeout: Duration,
    /// Abort if throughput stays below `low_speed_limit` bytes/s for `low_speed_time`.
    pub low_speed_limit: u32,
    pub low_speed_time: Duration,
    /// Hard wall-clock cap per request.
    pub timeout: Duration,
}

impl Default for CurlOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            low_speed_limit: 1024,
            low_speed_time: Duration::from_secs(60),
            timeout: Duration::from_secs(3600),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CurlTransport {
    options: CurlOptions,
}

impl CurlTransport {
    pub fn new(options: CurlOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl HttpTransport for CurlTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, UploadError> {
        let options = self.options;
        tokio::task::spawn_blocking(move || perform(&request, options))
            .await
            .map_err(|e| UploadError::Other(format!("transport task join: {}", e)))?
    }
}

fn perform(request: &HttpRequest, options: CurlOptions) -> Result<HttpResponse, UploadError> {
    let mut easy = curl::easy::Easy::new();
    easy.url(&request.url).map_err(curl_error)?;
    easy.connect_timeout(options.connect_timeout).map_err(curl_error)?;
    easy.low_speed_limit(options.low_speed_limit).map_err(curl_error)?;
    easy.low_speed_time(options.low_speed_time).map_err(curl_error)?;
    easy.timeout(options.timeout).map_err(curl_error)?;

    let body_len = request.body.len() as u64;
    match request.method {
        Method::Put => {
            easy.upload(true).map_err(curl_error)?;
            easy.in_filesize(body_len).map_err(curl_error)?;
        }
        Method::Post => {
            easy.post(true).map_err(curl_error)?;
            easy.post_field_size(body_len).map_err(curl_error)?;
        }
    }

    let mut list = curl::easy::List::new();
    for (k, v) in &request.headers {
        // libcurl sets Content-Length itself from the body size.
        if k.eq_ignore_ascii_case("content-length") {
            continue;
        }
        list.append(&format!("{}: {}", k.trim(), v.trim()))
            .map_err(curl_error)?;
    }
    // No 100-continue round trip before each chunk.
    list.append("Expect:").map_err(curl_error)?;
    easy.http_headers(list).map_err(curl_error)?;

    let mut reader = std::io::Cursor::new(request.body.as_slice());
    let mut response_body = Vec::new();
    {
        let mut transfer = easy.transfer();
        transfer
            .read_function(|buf| Ok(reader.read(buf).unwrap_or(0)))
            .map_err(curl_error)?;
        transfer
            .write_function(|data| {
                response_body.extend_from_slice(data);
                Ok(data.len())
            })
            .map_err(curl_error)?;
        transfer.perform().map_err(curl_error)?;
    }

    let status = easy.response_code().map_err(curl_error)? as u16;
    tracing::trace!(url = %request.url, status, bytes = body_len, "http request done");
    Ok(HttpResponse {
        status,
        body: response_body,
    })
}

/// Tag a curl failure: anything that means "no usable response" is `Network`.
fn curl_error(e: curl::Error) -> UploadError {
    if e.is_operation_timedout()
        || e.is_couldnt_connect()
        || e.is_couldnt_resolve_host()
        || e.is_couldnt_resolve_proxy()
        || e.is_read_error()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
        || e.is_partial_file()
        || e.is_ssl_connect_error()
    {
        return UploadError::Network(e.to_string());
    }
    UploadError::from_transport_message(e.to_string())
}
