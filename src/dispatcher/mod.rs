//! # Dispatcher Module
//!
//! Turns plain business functions into `/api/<name>` endpoints with a uniform
//! calling convention.
//!
//! ## Overview
//!
//! A handler is any `Fn(&RequestMap, &str, bool) -> HandlerResult` (or a type
//! implementing [`Handler`]). The dispatcher owns everything around it:
//!
//! 1. decode the body into a [`RequestMap`] (malformed input → empty map)
//! 2. resolve the caller's identity through the [`AuthResolver`](crate::security::AuthResolver)
//! 3. call the handler with `(map, username, authenticated)`
//! 4. map an [`ApiError`] to its status, or take the payload as a 200
//! 5. encode the JSON body and run middleware `after` hooks
//!
//! The dispatcher never looks at domain fields; it only enforces the calling
//! convention and the error → status mapping.
//!
//! ## Handler Registration
//!
//! Handlers are registered once at startup into a [`Registry`], which the
//! [`Dispatcher`] then owns read-only:
//!
//! ```rust
//! use forumd::dispatcher::{payload, ApiError, Dispatcher, HandlerResult, Registry, RequestMap};
//! use forumd::security::{AuthResolver, SessionStore};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let mut registry = Registry::new();
//! registry.register("whoami", |_req: &RequestMap, user: &str, auth: bool| -> HandlerResult {
//!     if !auth {
//!         return Err(ApiError::authorization());
//!     }
//!     Ok(payload(json!({ "username": user })))
//! });
//!
//! let sessions = Arc::new(SessionStore::new());
//! let dispatcher = Dispatcher::new(registry, AuthResolver::new(sessions));
//! assert!(dispatcher.handles("/api/whoami"));
//! ```
//!
//! ## Error Handling
//!
//! - Unbound paths: `dispatch` returns `None`; the service answers 404
//! - Handler errors: mapped by kind (400/403/404/500), body `{"error": "..."}`
//! - Handler panics: caught, logged with the request id, answered as 500
//! - Internal detail of 500-class errors never reaches the client

mod codec;
mod core;
mod error;

pub use codec::{encode_payload, payload, Payload, RequestMap, FALLBACK_ERROR_BODY};
pub use self::core::{
    latency_ms, ApiRequest, ApiResponse, Dispatcher, Handler, HandlerResult, HeaderVec, Registry,
    API_PREFIX, ERROR_KEY, MAX_INLINE_HEADERS,
};
pub use error::{map_error, ApiError, ErrorKind};
