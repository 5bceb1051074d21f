use crate::dispatcher::{ApiResponse, HeaderVec};
use crate::middleware::apply_security_headers;
use http::StatusCode;
use std::io::{self, Write};
use std::sync::Arc;

/// Canonical reason phrase for a status code.
pub(crate) fn status_reason(status: u16) -> &'static str {
    StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown")
}

/// Response writer for one connection.
///
/// Every response closes the connection afterwards, so a body without a
/// known length (streamed gzip) is delimited by the close. Security headers
/// are applied to every head written through this type.
pub struct Response<'a> {
    out: &'a mut dyn Write,
    status: u16,
    headers: HeaderVec,
}

impl<'a> Response<'a> {
    pub fn new(out: &'a mut dyn Write) -> Self {
        Self {
            out,
            status: 200,
            headers: HeaderVec::new(),
        }
    }

    pub fn status_code(&mut self, status: u16) -> &mut Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Set a header, replacing any earlier value of the same name.
    pub fn header(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value.into()));
        self
    }

    pub fn headers_mut(&mut self) -> &mut HeaderVec {
        &mut self.headers
    }

    /// Write head and a complete body.
    pub fn send(mut self, body: &[u8]) -> io::Result<()> {
        self.write_head(Some(body.len()))?;
        self.out.write_all(body)?;
        self.out.flush()
    }

    /// Write the head and hand out the connection for a streamed body.
    pub fn start_body(mut self) -> io::Result<&'a mut dyn Write> {
        self.write_head(None)?;
        Ok(self.out)
    }

    fn write_head(&mut self, content_length: Option<usize>) -> io::Result<()> {
        apply_security_headers(&mut self.headers);

        let mut head = format!("HTTP/1.1 {} {}\r\n", self.status, status_reason(self.status));
        for (name, value) in &self.headers {
            head.push_str(name);
            head.push_str(": ");
            head.push_str(value);
            head.push_str("\r\n");
        }
        if let Some(len) = content_length {
            head.push_str(&format!("content-length: {len}\r\n"));
        }
        head.push_str("connection: close\r\n\r\n");
        self.out.write_all(head.as_bytes())
    }
}

/// Write a dispatcher response.
pub fn write_api_response(mut res: Response<'_>, api: ApiResponse) -> io::Result<()> {
    res.status_code(api.status);
    for (name, value) in api.headers {
        res.header(&name, value);
    }
    res.send(&api.body)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn head_of(raw: &[u8]) -> String {
        let text = String::from_utf8_lossy(raw);
        text.split("\r\n\r\n").next().unwrap_or("").to_string()
    }

    #[test]
    fn test_status_reason() {
        assert_eq!(status_reason(200), "OK");
        assert_eq!(status_reason(404), "Not Found");
        assert_eq!(status_reason(405), "Method Not Allowed");
        assert_eq!(status_reason(999), "Unknown");
    }

    #[test]
    fn test_send_writes_length_and_security_headers() {
        let mut out = Vec::new();
        let mut res = Response::new(&mut out);
        res.status_code(400).header("content-type", "text/plain");
        res.send(b"bad").unwrap();

        let head = head_of(&out);
        assert!(head.starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert!(head.contains("content-length: 3"));
        assert!(head.contains("connection: close"));
        assert!(head.contains("x-frame-options: DENY"));
        assert!(out.ends_with(b"\r\n\r\nbad"));
    }

    #[test]
    fn test_streamed_body_has_no_length() {
        let mut out = Vec::new();
        {
            let res = Response::new(&mut out);
            let body = res.start_body().unwrap();
            body.write_all(b"chunk").unwrap();
        }
        assert!(!head_of(&out).contains("content-length"));
        assert!(out.ends_with(b"chunk"));
    }

    #[test]
    fn test_write_api_response_keeps_handler_headers() {
        let mut out = Vec::new();
        let mut api = ApiResponse::json(403, &serde_json::json!({"error": "403"}));
        api.set_header("x-request-id", "01J0000000000000000000000");
        write_api_response(Response::new(&mut out), api).unwrap();

        let head = head_of(&out);
        assert!(head.starts_with("HTTP/1.1 403 Forbidden"));
        assert!(head.contains("content-type: application/json"));
        assert!(head.contains("x-request-id: 01J0000000000000000000000"));
        assert!(out.ends_with(br#"{"error":"403"}"#));
    }
}
