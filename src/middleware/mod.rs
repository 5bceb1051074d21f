//! Request middleware and response hardening.
//!
//! [`Middleware`] hooks run around every dispatched API call. The security
//! header set in [`security_headers`] is applied by the HTTP layer to every
//! response the server writes, static or API.

mod core;
pub mod security_headers;
mod tracing;

pub use self::core::Middleware;
pub use security_headers::{apply_security_headers, SECURITY_HEADERS};
pub use self::tracing::TracingMiddleware;
