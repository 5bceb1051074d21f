use super::conn::Connection;
use super::request::read_request;
use super::response::Response;
use super::service::HttpService;
use may::coroutine::JoinHandle;
use may::net::{TcpListener, TcpStream};
use rustls::ServerConfig;
use std::io::{self, BufReader};
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Read/write timeout applied to every connection unless overridden.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Listener settings.
#[derive(Clone)]
pub struct ServerOptions {
    /// Serve HTTPS with this profile; plaintext when `None`
    pub tls: Option<Arc<ServerConfig>>,
    /// Per-connection read and write timeout
    pub timeout: Option<Duration>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            tls: None,
            timeout: Some(DEFAULT_TIMEOUT),
        }
    }
}

/// HTTP server running a service on `may` coroutines.
pub struct HttpServer<T>(pub T);

/// Handle to a running HTTP server
///
/// Provides methods for waiting until the server is ready, stopping it gracefully,
/// or joining the accept coroutine.
pub struct ServerHandle {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl ServerHandle {
    /// Address actually bound (resolves port `0`).
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Wait for the server to be ready to accept connections
    ///
    /// Polls the server address by attempting TCP connections until successful.
    ///
    /// # Errors
    ///
    /// Returns `TimedOut` if the server doesn't become ready within ~250ms (50 attempts × 5ms).
    pub fn wait_ready(&self) -> io::Result<()> {
        for _ in 0..50 {
            if std::net::TcpStream::connect(self.addr).is_ok() {
                return Ok(());
            }
            thread::sleep(Duration::from_millis(5));
        }
        Err(io::Error::new(io::ErrorKind::TimedOut, "server not ready"))
    }

    /// Stop accepting connections and wait for the accept loop to end.
    ///
    /// Connections already accepted finish on their own coroutines.
    pub fn stop(self) {
        // SAFETY: cancel() is unsafe in may; the handle is live and the accept
        // loop holds no state that needs unwinding beyond the listener.
        unsafe {
            self.handle.coroutine().cancel();
        }
        let _ = self.handle.join();
        info!(addr = %self.addr, "Server stopped");
    }

    /// Block until the accept loop ends.
    ///
    /// # Errors
    ///
    /// Returns an error if the accept coroutine panicked.
    pub fn join(self) -> std::thread::Result<()> {
        self.handle.join()
    }
}

impl<T: HttpService> HttpServer<T> {
    /// Bind `addr` and start accepting.
    ///
    /// Binding happens before this returns, so bind failures surface here.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid or cannot be bound.
    pub fn start<A: ToSocketAddrs>(
        self,
        addr: A,
        options: ServerOptions,
    ) -> io::Result<ServerHandle> {
        let addr = addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "invalid address"))?;
        let listener = TcpListener::bind(addr)?;
        let local = listener.local_addr()?;
        info!(
            addr = %local,
            tls = options.tls.is_some(),
            timeout_secs = options.timeout.map_or(0, |t| t.as_secs()),
            "Listening"
        );

        let service = Arc::new(self.0);
        let handle = may::go!(move || accept_loop(&listener, &service, &options));
        Ok(ServerHandle {
            addr: local,
            handle,
        })
    }
}

/// Pause after the `failures`-th consecutive accept error, doubling up to one second.
fn accept_backoff(failures: u32) -> Duration {
    let ms = 5u64.saturating_mul(1 << failures.saturating_sub(1).min(8));
    Duration::from_millis(ms.min(1000))
}

fn accept_loop<T: HttpService>(
    listener: &TcpListener,
    service: &Arc<T>,
    options: &ServerOptions,
) {
    let mut failures = 0u32;
    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                failures = 0;
                let service = Arc::clone(service);
                let tls = options.tls.as_ref().map(Arc::clone);
                let timeout = options.timeout;
                may::go!(move || serve_connection(stream, service.as_ref(), tls, timeout));
            }
            Err(e) => {
                failures = failures.saturating_add(1);
                let pause = accept_backoff(failures);
                warn!(error = %e, failures = failures, backoff = ?pause, "Accept failed");
                may::coroutine::sleep(pause);
            }
        }
    }
}

fn serve_connection<T: HttpService>(
    stream: TcpStream,
    service: &T,
    tls: Option<Arc<ServerConfig>>,
    timeout: Option<Duration>,
) {
    let peer = stream
        .peer_addr()
        .map_or_else(|_| "unknown".to_string(), |a| a.to_string());
    if let Err(e) = stream
        .set_read_timeout(timeout)
        .and_then(|()| stream.set_write_timeout(timeout))
    {
        warn!(peer = %peer, error = %e, "Failed to set socket timeouts");
        return;
    }
    let mut conn = match Connection::accept(stream, tls) {
        Ok(conn) => conn,
        Err(e) => {
            warn!(peer = %peer, error = %e, "Failed to set up TLS session");
            return;
        }
    };

    let parsed = {
        let mut reader = BufReader::new(&mut conn);
        read_request(&mut reader)
    };
    let result = match parsed {
        Ok(Some(req)) => service.call(req, Response::new(&mut conn)),
        Ok(None) => Ok(()),
        Err(e) => match e.status() {
            Some(status) => {
                debug!(peer = %peer, status = status, error = %e, "Rejected request");
                let mut res = Response::new(&mut conn);
                res.status_code(status);
                res.send(b"")
            }
            None => {
                debug!(peer = %peer, error = %e, "Connection dropped before request");
                Ok(())
            }
        },
    };
    if let Err(e) = result {
        debug!(peer = %peer, error = %e, "Connection closed with error");
    }
    conn.close();
}
