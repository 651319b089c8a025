//! Request description and body sources
//!
//! An [`ApiRequest`] is owned by the caller and lent mutably to
//! [`RequestExecutor::send`](super::RequestExecutor::send) for one logical
//! send. Retries re-read the same body after resetting it to the start.

use std::fmt;
use std::io::{self, Read, Seek, SeekFrom};
use std::time::Duration;

use nimbus_domain::constants::BODY_PREVIEW_LIMIT;
use reqwest::Method;
use url::Url;

use crate::api::ApiError;

const READ_CHUNK: usize = 8 * 1024;

/// Observer notified while a request body is written.
pub trait ProgressListener: Send + Sync {
    /// `total` is 0 when the body length is unknown.
    fn on_progress(&self, sent: u64, total: u64);
}

impl<F> ProgressListener for F
where
    F: Fn(u64, u64) + Send + Sync,
{
    fn on_progress(&self, sent: u64, total: u64) {
        self(sent, total);
    }
}

/// Readable request body that may support rewinding.
pub trait BodySource: Send {
    /// Reads the next bytes, returning 0 at the end.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Rewinds to the first byte.
    fn reset(&mut self) -> io::Result<()>;

    /// Length in bytes, when known up front.
    fn content_length(&self) -> Option<u64>;

    /// Full contents for logging, for bodies held in memory.
    fn preview(&self) -> Option<&[u8]> {
        None
    }
}

/// In-memory body. Always resettable.
#[derive(Debug, Clone)]
pub struct BytesBody {
    data: Vec<u8>,
    position: usize,
}

impl BytesBody {
    /// In-memory body.
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self { data: data.into(), position: 0 }
    }
}

impl BodySource for BytesBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = &self.data[self.position..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.position += n;
        Ok(n)
    }

    fn reset(&mut self) -> io::Result<()> {
        self.position = 0;
        Ok(())
    }

    fn content_length(&self) -> Option<u64> {
        Some(self.data.len() as u64)
    }

    fn preview(&self) -> Option<&[u8]> {
        Some(&self.data)
    }
}

/// Body backed by a seekable reader; reset seeks back to the start.
pub struct ReaderBody<R> {
    reader: R,
    length: Option<u64>,
}

impl<R: Read + Seek + Send> ReaderBody<R> {
    /// Body read from `reader`; `length` is reported to progress listeners.
    pub fn new(reader: R, length: Option<u64>) -> Self {
        Self { reader, length }
    }
}

impl<R: Read + Seek + Send> BodySource for ReaderBody<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }

    fn reset(&mut self) -> io::Result<()> {
        self.reader.seek(SeekFrom::Start(0)).map(|_| ())
    }

    fn content_length(&self) -> Option<u64> {
        self.length
    }
}

/// Body that can be read exactly once, such as a pipe or socket.
pub struct OneShotBody<R> {
    reader: R,
    length: Option<u64>,
    touched: bool,
}

impl<R: Read + Send> OneShotBody<R> {
    /// Body that can be read exactly once.
    pub fn new(reader: R, length: Option<u64>) -> Self {
        Self { reader, length, touched: false }
    }
}

impl<R: Read + Send> BodySource for OneShotBody<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.touched = true;
        self.reader.read(buf)
    }

    fn reset(&mut self) -> io::Result<()> {
        if self.touched {
            return Err(io::Error::new(io::ErrorKind::Unsupported, "one-shot body already read"));
        }
        Ok(())
    }

    fn content_length(&self) -> Option<u64> {
        self.length
    }
}

/// One HTTP request: method, URL, ordered headers, optional body.
pub struct ApiRequest {
    method: Method,
    url: Url,
    headers: Vec<(String, String)>,
    body: Option<Box<dyn BodySource>>,
    timeout: Option<Duration>,
    max_attempts: Option<u32>,
    sent: bool,
}

impl ApiRequest {
    /// Request with no headers or body.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
            body: None,
            timeout: None,
            max_attempts: None,
            sent: false,
        }
    }

    /// `GET` request.
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// `OPTIONS` request.
    pub fn options(url: Url) -> Self {
        Self::new(Method::OPTIONS, url)
    }

    /// Appends a header. Repeated names are sent in insertion order.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Attaches a body, replacing any previous one.
    #[must_use]
    pub fn body(mut self, body: impl BodySource + 'static) -> Self {
        self.body = Some(Box::new(body));
        self
    }

    /// Sets an in-memory JSON body and its content type.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Config`] if `value` cannot be serialized.
    pub fn json<T: serde::Serialize>(self, value: &T) -> Result<Self, ApiError> {
        let bytes = serde_json::to_vec(value)
            .map_err(|e| ApiError::Config(format!("failed to serialize request body: {e}")))?;
        Ok(self.header("Content-Type", "application/json").body(BytesBody::new(bytes)))
    }

    /// Timeout for connecting and reading, overriding the executor default.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Attempt budget for this request, overriding the connection-wide one.
    #[must_use]
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts.max(1));
        self
    }

    /// HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Target URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Extra headers in insertion order.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Per-request timeout, if set.
    pub fn request_timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Per-request attempt budget, if set.
    pub fn attempt_budget(&self) -> Option<u32> {
        self.max_attempts
    }

    /// Whether a body is attached.
    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    /// Rewinds a body consumed by an earlier send.
    pub(crate) fn prepare_for_send(&mut self) -> Result<(), ApiError> {
        if self.sent {
            if let Some(body) = self.body.as_mut() {
                body.reset().map_err(|_| ApiError::BodyNotResettable)?;
            }
        }
        self.sent = true;
        Ok(())
    }

    pub(crate) fn reset_body(&mut self) -> io::Result<()> {
        match self.body.as_mut() {
            Some(body) => body.reset(),
            None => Ok(()),
        }
    }

    /// Reads the whole body, reporting progress per chunk.
    pub(crate) fn read_body(
        &mut self,
        progress: Option<&dyn ProgressListener>,
    ) -> io::Result<Option<Vec<u8>>> {
        let Some(body) = self.body.as_mut() else {
            return Ok(None);
        };

        let total = body.content_length().unwrap_or(0);
        let mut data = Vec::with_capacity(usize::try_from(total).unwrap_or(0));
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            let n = body.read(&mut chunk)?;
            if n == 0 {
                break;
            }
            data.extend_from_slice(&chunk[..n]);
            if let Some(listener) = progress {
                listener.on_progress(data.len() as u64, total);
            }
        }
        Ok(Some(data))
    }
}

impl fmt::Debug for ApiRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiRequest")
            .field("method", &self.method)
            .field("url", &self.url.as_str())
            .field("headers", &self.headers.len())
            .field("has_body", &self.body.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Multi-line rendering used by the attempt log.
///
/// Empty header values are skipped and `Authorization` is redacted. In-memory
/// bodies are previewed up to a fixed byte limit.
impl fmt::Display for ApiRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)?;

        for (name, value) in &self.headers {
            if value.trim().is_empty() {
                continue;
            }
            if name.eq_ignore_ascii_case("authorization") {
                write!(f, "\n{name}: <redacted>")?;
            } else {
                write!(f, "\n{name}: {value}")?;
            }
        }

        if let Some(bytes) = self.body.as_ref().and_then(|body| body.preview()) {
            let shown = &bytes[..bytes.len().min(BODY_PREVIEW_LIMIT)];
            write!(f, "\n\n{}", String::from_utf8_lossy(shown))?;
            if bytes.len() > BODY_PREVIEW_LIMIT {
                write!(f, "... ({} bytes)", bytes.len())?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::Mutex;

    use super::*;

    fn url() -> Url {
        Url::parse("https://api.example.com/2.0/files/1").unwrap()
    }

    #[test]
    fn bytes_body_rewinds() {
        let mut request = ApiRequest::new(Method::POST, url()).body(BytesBody::new("hello"));
        assert_eq!(request.read_body(None).unwrap().unwrap(), b"hello");
        request.reset_body().unwrap();
        assert_eq!(request.read_body(None).unwrap().unwrap(), b"hello");
    }

    #[test]
    fn reader_body_seeks_to_start() {
        let mut request = ApiRequest::new(Method::PUT, url())
            .body(ReaderBody::new(Cursor::new(b"abc".to_vec()), Some(3)));
        request.read_body(None).unwrap();
        assert!(request.reset_body().is_ok());
        assert_eq!(request.read_body(None).unwrap().unwrap(), b"abc");
    }

    #[test]
    fn one_shot_body_refuses_reset_after_read() {
        let mut request =
            ApiRequest::new(Method::POST, url()).body(OneShotBody::new(Cursor::new(vec![1, 2]), None));
        assert!(request.reset_body().is_ok(), "untouched body can be reset");
        request.read_body(None).unwrap();
        assert!(request.reset_body().is_err());
    }

    #[test]
    fn resending_consumed_one_shot_body_fails() {
        let mut request =
            ApiRequest::new(Method::POST, url()).body(OneShotBody::new(Cursor::new(vec![1]), None));
        request.prepare_for_send().unwrap();
        request.read_body(None).unwrap();
        assert!(matches!(request.prepare_for_send(), Err(ApiError::BodyNotResettable)));
    }

    #[test]
    fn progress_reports_running_total() {
        let seen = Mutex::new(Vec::new());
        let listener = |sent: u64, total: u64| seen.lock().unwrap().push((sent, total));

        let data = vec![7u8; READ_CHUNK + 10];
        let mut request = ApiRequest::new(Method::POST, url()).body(BytesBody::new(data));
        request.read_body(Some(&listener)).unwrap();

        let total = (READ_CHUNK + 10) as u64;
        assert_eq!(*seen.lock().unwrap(), vec![(READ_CHUNK as u64, total), (total, total)]);
    }

    #[test]
    fn unknown_length_reports_zero_total() {
        let seen = Mutex::new(Vec::new());
        let listener = |sent: u64, total: u64| seen.lock().unwrap().push((sent, total));

        let mut request = ApiRequest::new(Method::POST, url())
            .body(OneShotBody::new(Cursor::new(vec![1, 2, 3]), None));
        request.read_body(Some(&listener)).unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![(3, 0)]);
    }

    #[test]
    fn display_redacts_authorization_and_skips_empty_headers() {
        let request = ApiRequest::new(Method::POST, url())
            .header("Authorization", "Bearer secret")
            .header("X-Empty", " ")
            .header("Content-Type", "application/json")
            .body(BytesBody::new(r#"{"name":"report.pdf"}"#));

        let rendered = request.to_string();
        assert!(rendered.starts_with("POST https://api.example.com/2.0/files/1"));
        assert!(rendered.contains("Authorization: <redacted>"));
        assert!(!rendered.contains("secret"));
        assert!(!rendered.contains("X-Empty"));
        assert!(rendered.ends_with(r#"{"name":"report.pdf"}"#));
    }

    #[test]
    fn display_truncates_large_bodies() {
        let request =
            ApiRequest::new(Method::POST, url()).body(BytesBody::new(vec![b'a'; BODY_PREVIEW_LIMIT * 2]));
        let rendered = request.to_string();
        assert!(rendered.ends_with(&format!("... ({} bytes)", BODY_PREVIEW_LIMIT * 2)));
    }
}
