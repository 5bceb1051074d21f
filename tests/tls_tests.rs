mod common;

use common::{parse_reply, start_server, Reply};
use forumd::tls::{load_server_config, ListenerConfig};
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, ServerName};
use rustls::{ClientConfig, ClientConnection, ProtocolVersion, RootCertStore, StreamOwned};
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const CA: &str = "tests/staticdata/tls/ca.pem";
const CERT: &str = "tests/staticdata/tls/cert.pem";
const KEY: &str = "tests/staticdata/tls/key.pem";

fn client_config(versions: &[&'static rustls::SupportedProtocolVersion]) -> Arc<ClientConfig> {
    let mut roots = RootCertStore::empty();
    for cert in CertificateDer::pem_file_iter(CA).unwrap() {
        roots.add(cert.unwrap()).unwrap();
    }
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = ClientConfig::builder_with_provider(provider)
        .with_protocol_versions(versions)
        .unwrap()
        .with_root_certificates(roots)
        .with_no_client_auth();
    Arc::new(config)
}

fn tls_get(
    addr: &SocketAddr,
    path: &str,
    config: Arc<ClientConfig>,
) -> (Reply, Option<ProtocolVersion>) {
    let tcp = TcpStream::connect(addr).unwrap();
    tcp.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    let name = ServerName::try_from("localhost").unwrap();
    let conn = ClientConnection::new(config, name).unwrap();
    let mut stream = StreamOwned::new(conn, tcp);
    stream
        .write_all(format!("GET {path} HTTP/1.1\r\nHost: localhost\r\n\r\n").as_bytes())
        .unwrap();
    let mut raw = Vec::new();
    let _ = stream.read_to_end(&mut raw);
    let version = stream.conn.protocol_version();
    (parse_reply(&raw), version)
}

fn tls_server() -> common::TestServer {
    let config = load_server_config(Path::new(CERT), Path::new(KEY)).unwrap();
    start_server(false, Some(config))
}

#[test]
fn test_tls13_request() {
    let server = tls_server();
    let client = client_config(&[&rustls::version::TLS13]);
    let (reply, version) = tls_get(&server.addr, "/data/hello.txt", client);
    assert_eq!(reply.status, 200);
    assert_eq!(reply.gunzip(), b"Hello\n");
    assert_eq!(version, Some(ProtocolVersion::TLSv1_3));
}

#[test]
fn test_tls12_client_accepted() {
    let server = tls_server();
    let (reply, version) = tls_get(&server.addr, "/", client_config(&[&rustls::version::TLS12]));
    assert_eq!(reply.status, 200);
    assert_eq!(reply.header("x-frame-options"), Some("DENY"));
    assert_eq!(version, Some(ProtocolVersion::TLSv1_2));
}

#[test]
fn test_plaintext_request_to_tls_port_gets_no_http_response() {
    let server = tls_server();
    let raw = common::send_raw(&server.addr, b"GET / HTTP/1.1\r\nHost: x\r\n\r\n");
    assert!(!raw.starts_with(b"HTTP/"));
}

#[test]
fn test_listener_config_enables_tls_from_paths() {
    let mut config = forumd::Config::from_template().unwrap();
    config.set("https", "address", "127.0.0.1:0");
    config.set("https", "certificate", CERT);
    config.set("https", "key", KEY);
    let listener = ListenerConfig::from_config(&config);
    assert!(listener.is_tls());
    assert!(listener.server_config().unwrap().is_some());

    config.set("https", "key", "tests/staticdata/tls/missing.pem");
    assert!(ListenerConfig::from_config(&config).server_config().is_err());
}
