use crate::dispatcher::HeaderVec;
use http::Method;
use std::fmt;
use std::io::{self, BufRead, Read};
use std::sync::Arc;
use tracing::debug;

/// Maximum header section size (32 KiB)
pub const MAX_HEADER_SIZE: usize = 32 * 1024;

/// Maximum request body size (1 MiB)
pub const MAX_BODY_SIZE: usize = 1_048_576;

const MAX_HEADERS: usize = 64;

/// One parsed HTTP/1.1 request.
#[derive(Debug, PartialEq)]
pub struct ParsedRequest {
    pub method: Method,
    /// Path without query string, still percent-encoded
    pub path: String,
    /// Raw query string (without `?`), empty when absent
    pub query: String,
    /// Lowercase names
    pub headers: HeaderVec,
    pub cookies: HeaderVec,
    pub body: Vec<u8>,
}

impl ParsedRequest {
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Reasons a request could not be read.
#[derive(Debug)]
pub enum RequestError {
    Malformed(String),
    HeadersTooLarge,
    BodyTooLarge,
    ChunkedUnsupported,
    /// Transport failure (includes TLS handshake errors and timeouts)
    Io(io::Error),
}

impl RequestError {
    /// Status to answer with, `None` when the connection is unusable.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            RequestError::Malformed(_) => Some(400),
            RequestError::HeadersTooLarge => Some(431),
            RequestError::BodyTooLarge => Some(413),
            RequestError::ChunkedUnsupported => Some(501),
            RequestError::Io(_) => None,
        }
    }
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestError::Malformed(msg) => write!(f, "malformed request: {msg}"),
            RequestError::HeadersTooLarge => {
                write!(f, "header section exceeds {MAX_HEADER_SIZE} bytes")
            }
            RequestError::BodyTooLarge => write!(f, "body exceeds {MAX_BODY_SIZE} bytes"),
            RequestError::ChunkedUnsupported => {
                write!(f, "chunked transfer encoding not supported")
            }
            RequestError::Io(e) => write!(f, "read error: {e}"),
        }
    }
}

impl std::error::Error for RequestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RequestError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for RequestError {
    fn from(e: io::Error) -> Self {
        RequestError::Io(e)
    }
}

/// Parse the `Cookie` header into name/value pairs.
pub fn parse_cookies(headers: &HeaderVec) -> HeaderVec {
    headers
        .iter()
        .filter(|(k, _)| k.as_ref() == "cookie")
        .flat_map(|(_, c)| c.split(';'))
        .filter_map(|pair| {
            let mut parts = pair.trim().splitn(2, '=');
            let name = parts.next()?.trim();
            if name.is_empty() {
                return None;
            }
            let value = parts.next().unwrap_or("").trim().to_string();
            Some((Arc::from(name), value))
        })
        .collect()
}

/// Read one request from the stream.
///
/// Returns `Ok(None)` when the peer closed before sending anything (e.g. a
/// readiness probe). The body is read up to `Content-Length`, never trusting
/// it beyond [`MAX_BODY_SIZE`].
pub fn read_request<R: BufRead>(reader: &mut R) -> Result<Option<ParsedRequest>, RequestError> {
    let mut head = Vec::with_capacity(1024);
    loop {
        let remaining = (MAX_HEADER_SIZE + 1).saturating_sub(head.len());
        let read = reader
            .by_ref()
            .take(remaining as u64)
            .read_until(b'\n', &mut head)?;
        if read == 0 {
            if head.is_empty() {
                return Ok(None);
            }
            if head.len() > MAX_HEADER_SIZE {
                return Err(RequestError::HeadersTooLarge);
            }
            return Err(RequestError::Malformed("connection closed mid-request".into()));
        }
        if head.len() > MAX_HEADER_SIZE {
            return Err(RequestError::HeadersTooLarge);
        }
        if head.ends_with(b"\r\n\r\n") || head.ends_with(b"\n\n") {
            break;
        }
    }

    let mut parsed_headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut req = httparse::Request::new(&mut parsed_headers);
    match req.parse(&head) {
        Ok(httparse::Status::Complete(_)) => {}
        Ok(httparse::Status::Partial) => {
            return Err(RequestError::Malformed("incomplete request head".into()))
        }
        Err(e) => return Err(RequestError::Malformed(e.to_string())),
    }

    let method = Method::from_bytes(req.method.unwrap_or("").as_bytes())
        .map_err(|e| RequestError::Malformed(e.to_string()))?;
    let target = req.path.unwrap_or("/");
    let (path, query) = match target.split_once('?') {
        Some((p, q)) => (p.to_string(), q.to_string()),
        None => (target.to_string(), String::new()),
    };

    let mut headers = HeaderVec::new();
    let mut content_length: Option<usize> = None;
    for h in req.headers.iter() {
        let name = h.name.to_ascii_lowercase();
        let value = String::from_utf8_lossy(h.value).trim().to_string();
        if name == "content-length" {
            content_length = Some(
                value
                    .parse()
                    .map_err(|_| RequestError::Malformed("invalid content-length".into()))?,
            );
        }
        if name == "transfer-encoding" && value.to_ascii_lowercase().contains("chunked") {
            return Err(RequestError::ChunkedUnsupported);
        }
        headers.push((Arc::from(name), value));
    }

    let len = content_length.unwrap_or(0);
    if len > MAX_BODY_SIZE {
        return Err(RequestError::BodyTooLarge);
    }
    let mut body = Vec::with_capacity(len);
    reader.by_ref().take(len as u64).read_to_end(&mut body)?;
    if body.len() < len {
        return Err(RequestError::Malformed("body shorter than content-length".into()));
    }

    let cookies = parse_cookies(&headers);
    debug!(
        method = %method,
        path = %path,
        header_count = headers.len(),
        body_len = body.len(),
        "Request parsed"
    );

    Ok(Some(ParsedRequest {
        method,
        path,
        query,
        headers,
        cookies,
        body,
    }))
}
