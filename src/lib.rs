//! # forumd
//!
//! **forumd** is a small self-hosted forum backend: a JSON API behind a
//! uniform dispatch layer plus hardened static and data-file delivery, served
//! on `may` coroutines over plain HTTP or a restricted TLS profile.
//!
//! ## Architecture
//!
//! - **[`dispatcher`]** - handler registry and the decode → resolve → invoke → map → encode pipeline
//! - **[`security`]** - session store and the caller identity resolver
//! - **[`handlers`]** - business handlers (`register`, `editpassword`, `login`, `logout`) and their collaborators
//! - **[`registry`]** - binds the handlers to `/api/` paths
//! - **[`static_files`]** - path sanitation, MIME detection, gzip streaming
//! - **[`middleware`]** - dispatcher hooks and the security header set
//! - **[`server`]** - HTTP/1.1 connection handling and the route table
//! - **[`tls`]** - listener settings and the TLS profile
//! - **[`config`]** - template + file + environment configuration
//! - **[`cli`]** - the `forumd` command line
//!
//! ### Request Handling Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Client
//!     participant Server as HttpServer<br/>(may coroutine)
//!     participant Service as AppService
//!     participant Dispatcher
//!     participant Resolver as AuthResolver
//!     participant Handler
//!     participant Files as StaticFiles
//!
//!     Client->>Server: HTTP/1.1 request (TLS optional)
//!     Server->>Server: read_request (32 KiB head, 1 MiB body)
//!     Server->>Service: call(ParsedRequest, Response)
//!
//!     alt /api/<name>
//!         Service->>Dispatcher: dispatch(ApiRequest)
//!         Dispatcher->>Dispatcher: RequestMap::decode(body)
//!         Dispatcher->>Resolver: resolve(session cookie, map)
//!         Resolver-->>Dispatcher: Identity (username, authenticated)
//!         Dispatcher->>Handler: call(map, username, authenticated)
//!         alt Ok(payload)
//!             Handler-->>Dispatcher: 200 + JSON object
//!         else Err(ApiError)
//!             Handler-->>Dispatcher: map_error → {"error": "<status>[ reason]"}
//!         end
//!         Dispatcher-->>Service: ApiResponse + X-Request-Id
//!     else /data/... or frontend
//!         Service->>Files: serve(path)
//!         Files->>Files: sanitize (reject .., NUL, backslash → 400)
//!         Files-->>Client: gzip stream
//!     end
//!
//!     Service-->>Client: security headers, Connection: close
//! ```
//!
//! ### Key Patterns
//!
//! 1. **One coroutine per connection**: handlers are reentrant and run in parallel
//! 2. **Read-only registry**: built once at startup, shared by `Arc` without locking
//! 3. **Typed errors**: handlers return [`dispatcher::ApiError`]; the dispatcher is the only place that turns one into a status
//! 4. **No error escapes**: handler panics are caught and answered as an opaque 500

pub mod cli;
pub mod config;
pub mod dispatcher;
pub mod handlers;
pub mod ids;
pub mod logging;
pub mod middleware;
pub mod registry;
pub mod runtime_config;
pub mod security;
pub mod server;
pub mod static_files;
pub mod tls;

pub use config::Config;
pub use dispatcher::{ApiError, Dispatcher, Registry, RequestMap};
pub use security::{AuthResolver, Identity, SessionStore};
pub use server::{AppService, HttpServer, ServerHandle, ServerOptions};
