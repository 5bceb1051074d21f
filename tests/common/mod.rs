#![allow(dead_code)]

use flate2::read::GzDecoder;
use forumd::handlers::{Argon2Hasher, FixedCaptcha, MemoryUserStore, Services, UserStore};
use forumd::registry::build_dispatcher;
use forumd::runtime_config::RuntimeConfig;
use forumd::security::SessionStore;
use forumd::server::{AppService, HttpServer, ServerHandle, ServerOptions};
use forumd::static_files::StaticFiles;
use rustls::ServerConfig;
use serde_json::Value;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::{Arc, Once};
use std::time::Duration;

pub const STATIC_ROOT: &str = "tests/staticdata";
pub const WEB_DIR: &str = "tests/staticdata/web";
pub const CAPTCHA_ID: &str = "c1";
pub const CAPTCHA_ANSWER: &str = "4821";

static MAY_INIT: Once = Once::new();

/// Ensures May coroutines are configured only once
pub fn setup_may_runtime() {
    MAY_INIT.call_once(|| RuntimeConfig::from_env().apply());
}

/// A forumd instance on an ephemeral port, stopped on drop.
pub struct TestServer {
    handle: Option<ServerHandle>,
    pub addr: SocketAddr,
    pub services: Arc<Services>,
    pub users: Arc<MemoryUserStore>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.stop();
        }
    }
}

pub fn services(captcha_enabled: bool) -> (Arc<Services>, Arc<MemoryUserStore>) {
    let users = Arc::new(MemoryUserStore::new());
    let services = Services {
        users: Arc::clone(&users) as Arc<dyn UserStore>,
        sessions: Arc::new(SessionStore::new()),
        hasher: Arc::new(Argon2Hasher::with_costs(8, 1).unwrap()),
        captcha: Arc::new(FixedCaptcha::new().with(CAPTCHA_ID, CAPTCHA_ANSWER)),
        captcha_enabled,
    };
    (Arc::new(services), users)
}

pub fn start_server(captcha_enabled: bool, tls: Option<Arc<ServerConfig>>) -> TestServer {
    setup_may_runtime();
    let (services, users) = services(captcha_enabled);
    let service = AppService::new(
        Arc::new(build_dispatcher(&services)),
        StaticFiles::data(STATIC_ROOT),
        Some(StaticFiles::web(WEB_DIR)),
    );
    let options = ServerOptions {
        tls,
        timeout: Some(Duration::from_secs(5)),
    };
    let handle = HttpServer(service).start("127.0.0.1:0", options).unwrap();
    handle.wait_ready().unwrap();
    TestServer {
        addr: handle.local_addr(),
        handle: Some(handle),
        services,
        users,
    }
}

/// Parsed HTTP/1.1 response.
#[derive(Debug)]
pub struct Reply {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Reply {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    pub fn gunzip(&self) -> Vec<u8> {
        gunzip(&self.body)
    }
}

pub fn gunzip(body: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    GzDecoder::new(body).read_to_end(&mut out).unwrap();
    out
}

pub fn parse_reply(raw: &[u8]) -> Reply {
    let pos = raw
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .unwrap_or_else(|| panic!("no header terminator in {:?}", String::from_utf8_lossy(raw)));
    let head = String::from_utf8_lossy(&raw[..pos]).to_string();
    let mut lines = head.split("\r\n");
    let status = lines
        .next()
        .and_then(|l| l.split_whitespace().nth(1))
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);
    let headers = lines
        .filter_map(|l| l.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();
    Reply {
        status,
        headers,
        body: raw[pos + 4..].to_vec(),
    }
}

/// Write `raw` and read until the server closes the connection.
pub fn send_raw(addr: &SocketAddr, raw: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    stream.write_all(raw).unwrap();
    let mut buf = Vec::new();
    let _ = stream.read_to_end(&mut buf);
    buf
}

pub fn request(addr: &SocketAddr, raw: &[u8]) -> Reply {
    parse_reply(&send_raw(addr, raw))
}

pub fn get(addr: &SocketAddr, path: &str) -> Reply {
    request(addr, format!("GET {path} HTTP/1.1\r\nHost: x\r\n\r\n").as_bytes())
}

pub fn post_json(addr: &SocketAddr, path: &str, body: &str) -> Reply {
    post_with_headers(addr, path, body, "")
}

/// POST with extra header lines (each ending in `\r\n`).
pub fn post_with_headers(addr: &SocketAddr, path: &str, body: &str, extra: &str) -> Reply {
    let raw = format!(
        "POST {path} HTTP/1.1\r\nHost: x\r\nContent-Type: application/json\r\n\
         Content-Length: {}\r\n{extra}\r\n{body}",
        body.len()
    );
    request(addr, raw.as_bytes())
}
