//! HTTP/1.1 front end on `may` coroutines.
//!
//! One coroutine per accepted connection, one request per connection. The
//! listener speaks plaintext or TLS depending on [`ServerOptions::tls`].

mod conn;
pub mod http_server;
pub mod request;
pub mod response;
pub mod service;

pub use conn::Connection;
pub use http_server::{HttpServer, ServerHandle, ServerOptions, DEFAULT_TIMEOUT};
pub use request::{
    parse_cookies, read_request, ParsedRequest, RequestError, MAX_BODY_SIZE, MAX_HEADER_SIZE,
};
pub use response::{write_api_response, Response};
pub use service::{AppService, HttpService};
