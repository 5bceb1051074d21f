//! On-disk file delivery: path sanitation, MIME detection, gzip streaming.
//!
//! Requested paths are rejected with 400 before any filesystem call when they
//! contain `..` (raw or percent-encoded), a NUL byte or a backslash. Accepted
//! paths go through the alias table, are resolved below the base directory,
//! and the file is streamed through a gzip encoder straight into the
//! connection.

use crate::server::Response;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, error, warn};

/// gzip level for delivery (speed over ratio)
pub const GZIP_LEVEL: u32 = 2;

/// Read buffer size when streaming a file.
pub const CHUNK_SIZE: usize = 16 * 1024;

/// Virtual path of the default avatar.
pub const DEFAULT_AVATAR: &str = "data/avatar/default";

/// Real file behind [`DEFAULT_AVATAR`].
pub const DEFAULT_AVATAR_FILE: &str = "assets/avatar.png";

#[derive(Debug, Clone)]
pub struct StaticFiles {
    base_dir: PathBuf,
    aliases: HashMap<String, String>,
    fallback: Option<String>,
}

impl StaticFiles {
    pub fn new<P: Into<PathBuf>>(base: P) -> Self {
        Self {
            base_dir: base.into(),
            aliases: HashMap::new(),
            fallback: None,
        }
    }

    /// Data root serving `/data/...`, with the default avatar alias.
    pub fn data<P: Into<PathBuf>>(root: P) -> Self {
        Self::new(root).with_alias(DEFAULT_AVATAR, DEFAULT_AVATAR_FILE)
    }

    /// Frontend bundle; unknown paths fall back to `index.html`.
    pub fn web<P: Into<PathBuf>>(dir: P) -> Self {
        Self::new(dir).with_fallback("index.html")
    }

    /// Rewrite the sanitized virtual path `from` to `to` (both relative).
    #[must_use]
    pub fn with_alias(mut self, from: &str, to: &str) -> Self {
        self.aliases.insert(from.to_string(), to.to_string());
        self
    }

    #[must_use]
    pub fn with_fallback(mut self, file: &str) -> Self {
        self.fallback = Some(file.to_string());
        self
    }

    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Validate a URL path and turn it into a relative filesystem path.
    ///
    /// `None` means the request must be refused with 400.
    #[must_use]
    pub fn sanitize(url_path: &str) -> Option<PathBuf> {
        if is_hostile(url_path) {
            return None;
        }
        let decoded = urlencoding::decode(url_path).ok()?;
        if is_hostile(&decoded) {
            return None;
        }

        let mut rel = PathBuf::new();
        for comp in Path::new(decoded.trim_start_matches('/')).components() {
            match comp {
                Component::Normal(s) => rel.push(s),
                Component::CurDir => {}
                _ => return None,
            }
        }
        Some(rel)
    }

    /// Sanitize, apply aliases and the fallback. Returns the file to open.
    #[must_use]
    pub fn resolve(&self, url_path: &str) -> Option<PathBuf> {
        let rel = Self::sanitize(url_path)?;
        let rel = match rel.to_str().and_then(|key| self.aliases.get(key)) {
            Some(target) => PathBuf::from(target),
            None => rel,
        };
        let full = self.base_dir.join(&rel);
        match &self.fallback {
            Some(fallback) if !full.is_file() => Some(self.base_dir.join(fallback)),
            _ => Some(full),
        }
    }

    /// `Content-Type` for a file, from its extension.
    #[must_use]
    pub fn content_type(path: &Path) -> String {
        let mime = mime_guess::from_path(path).first_or_octet_stream();
        let essence = mime.essence_str();
        let textual = mime.type_().as_str() == "text"
            || essence == "application/javascript"
            || essence == "application/json";
        if textual {
            format!("{essence}; charset=utf-8")
        } else {
            essence.to_string()
        }
    }

    /// Serve `url_path`; returns the status that was sent.
    ///
    /// A rejected path gets 400 with an empty body. A file that cannot be
    /// opened gets 404 (missing) or 500 with a short gzip body. Errors
    /// returned from here mean the connection is broken and must be closed.
    pub fn serve(&self, url_path: &str, mut res: Response<'_>) -> io::Result<u16> {
        let Some(path) = self.resolve(url_path) else {
            warn!(path = %url_path, "Rejected unsafe file path");
            res.status_code(400);
            res.send(b"")?;
            return Ok(400);
        };

        let file = match open_regular(&path) {
            Ok(file) => file,
            Err(e) => {
                let status = if e.kind() == io::ErrorKind::NotFound {
                    debug!(path = %url_path, file = %path.display(), "File not found");
                    404
                } else {
                    error!(
                        path = %url_path,
                        file = %path.display(),
                        error = %e,
                        "Failed to open file"
                    );
                    500
                };
                return send_opaque(res, status);
            }
        };

        res.status_code(200)
            .header("content-type", Self::content_type(&path))
            .header("content-encoding", "gzip");
        let out = res.start_body()?;

        let mut reader = BufReader::with_capacity(CHUNK_SIZE, file);
        let mut encoder = GzEncoder::new(out, Compression::new(GZIP_LEVEL));
        let streamed = io::copy(&mut reader, &mut encoder)
            .and_then(|bytes| encoder.finish()?.flush().map(|()| bytes));
        match streamed {
            Ok(bytes) => {
                debug!(path = %url_path, bytes = bytes, "File delivered");
                Ok(200)
            }
            Err(e) => {
                error!(path = %url_path, error = %e, "File stream aborted after headers");
                Err(e)
            }
        }
    }
}

fn is_hostile(path: &str) -> bool {
    path.contains("..") || path.contains('\0') || path.contains('\\')
}

fn open_regular(path: &Path) -> io::Result<File> {
    let file = File::open(path)?;
    if file.metadata()?.is_file() {
        Ok(file)
    } else {
        Err(io::Error::new(io::ErrorKind::NotFound, "not a regular file"))
    }
}

fn send_opaque(mut res: Response<'_>, status: u16) -> io::Result<u16> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::new(GZIP_LEVEL));
    encoder.write_all(status.to_string().as_bytes())?;
    let body = encoder.finish()?;
    res.status_code(status)
        .header("content-type", "text/plain; charset=utf-8")
        .header("content-encoding", "gzip");
    res.send(&body)?;
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;

    const ROOT: &str = "tests/staticdata";

    fn split(raw: &[u8]) -> (String, Vec<u8>) {
        let pos = raw
            .windows(4)
            .position(|w| w == b"\r\n\r\n")
            .expect("head terminator");
        (
            String::from_utf8_lossy(&raw[..pos]).to_string(),
            raw[pos + 4..].to_vec(),
        )
    }

    fn gunzip(body: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        GzDecoder::new(body).read_to_end(&mut out).unwrap();
        out
    }

    fn serve(sf: &StaticFiles, path: &str) -> (u16, String, Vec<u8>) {
        let mut raw = Vec::new();
        let status = sf.serve(path, Response::new(&mut raw)).unwrap();
        let (head, body) = split(&raw);
        (status, head, body)
    }

    #[test]
    fn test_sanitize_rejects_traversal() {
        for path in [
            "/data/../../etc/passwd",
            "/data/%2e%2e/%2e%2e/etc/passwd",
            "/data/%2E%2E%2Fsecret",
            "/data/a\\b",
            "/data/a%5cb",
            "/data/a%00b",
            "/data/%ff",
        ] {
            assert!(StaticFiles::sanitize(path).is_none(), "{path} accepted");
        }
    }

    #[test]
    fn test_sanitize_normalizes() {
        assert_eq!(
            StaticFiles::sanitize("/data/./hello%20world.txt"),
            Some(PathBuf::from("data/hello world.txt"))
        );
        assert_eq!(StaticFiles::sanitize("/"), Some(PathBuf::new()));
    }

    #[test]
    fn test_content_type() {
        assert_eq!(
            StaticFiles::content_type(Path::new("a.txt")),
            "text/plain; charset=utf-8"
        );
        assert_eq!(
            StaticFiles::content_type(Path::new("a.html")),
            "text/html; charset=utf-8"
        );
        assert_eq!(
            StaticFiles::content_type(Path::new("a.json")),
            "application/json; charset=utf-8"
        );
        assert_eq!(StaticFiles::content_type(Path::new("a.png")), "image/png");
        assert_eq!(
            StaticFiles::content_type(Path::new("noext")),
            "application/octet-stream"
        );
    }

    #[test]
    fn test_serves_gzip() {
        let sf = StaticFiles::data(ROOT);
        let (status, head, body) = serve(&sf, "/data/hello.txt");
        assert_eq!(status, 200);
        assert!(head.contains("content-encoding: gzip"));
        assert!(head.contains("content-type: text/plain; charset=utf-8"));
        assert!(head.contains("x-content-type-options: nosniff"));
        assert_eq!(gunzip(&body), b"Hello\n");
    }

    #[test]
    fn test_default_avatar_alias() {
        let sf = StaticFiles::data(ROOT);
        let (status, head, body) = serve(&sf, "/data/avatar/default");
        assert_eq!(status, 200);
        assert!(head.contains("content-type: image/png"));
        let expected = std::fs::read("tests/staticdata/assets/avatar.png").unwrap();
        assert_eq!(gunzip(&body), expected);
    }

    #[test]
    fn test_rejection_has_empty_body() {
        let sf = StaticFiles::data(ROOT);
        let (status, head, body) = serve(&sf, "/data/../../etc/passwd");
        assert_eq!(status, 400);
        assert!(head.contains("content-length: 0"));
        assert!(body.is_empty());
    }

    #[test]
    fn test_missing_file_is_opaque_404() {
        let sf = StaticFiles::data(ROOT);
        let (status, head, body) = serve(&sf, "/data/nope.txt");
        assert_eq!(status, 404);
        assert!(head.contains("content-encoding: gzip"));
        assert_eq!(gunzip(&body), b"404");

        let (status, _, _) = serve(&sf, "/data");
        assert_eq!(status, 404);
    }

    #[test]
    fn test_web_fallback_to_index() {
        let sf = StaticFiles::web("tests/staticdata/web");
        for path in ["/", "/thread/42"] {
            let (status, head, body) = serve(&sf, path);
            assert_eq!(status, 200, "{path}");
            assert!(head.contains("text/html"));
            assert!(String::from_utf8(gunzip(&body)).unwrap().contains("<title>forum</title>"));
        }
        let (_, _, body) = serve(&sf, "/app.js");
        assert_eq!(gunzip(&body), b"console.log('forum');\n");
    }
}
