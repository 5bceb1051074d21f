//! Dispatcher core: handler contract, registry, and the per-request pipeline.

use super::codec::{encode_payload, Payload, RequestMap};
use super::error::{map_error, ApiError};
use crate::ids::{RequestId, REQUEST_ID_HEADER};
use crate::middleware::Middleware;
use crate::security::AuthResolver;
use http::Method;
use serde_json::Value;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// URL prefix under which every handler is mounted.
pub const API_PREFIX: &str = "/api/";

/// JSON key carrying the error text in failure bodies.
pub const ERROR_KEY: &str = "error";

/// Maximum inline headers/cookies before heap allocation
pub const MAX_INLINE_HEADERS: usize = 16;

/// Stack-allocated header/cookie storage (lowercase names for headers).
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// What a business handler returns.
pub type HandlerResult = Result<Payload, ApiError>;

/// A business function bound to `/api/<name>`.
///
/// Called with the decoded request body, the resolved username and whether
/// that username is backed by a valid session. `username` may be a
/// client-asserted value when `authenticated` is `false`; it must only be
/// trusted for authorization when `authenticated` is `true`.
///
/// # Concurrency
///
/// Every request runs in its own coroutine and handlers are invoked from
/// many of them at once. Implementations must be reentrant; any shared
/// resource they touch (user store, session table) must synchronize itself.
/// The dispatcher provides no cross-request locking or transactions.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, request: &RequestMap, username: &str, authenticated: bool) -> HandlerResult;
}

impl<F> Handler for F
where
    F: Fn(&RequestMap, &str, bool) -> HandlerResult + Send + Sync + 'static,
{
    fn call(&self, request: &RequestMap, username: &str, authenticated: bool) -> HandlerResult {
        self(request, username, authenticated)
    }
}

/// Path → handler bindings, populated once at startup.
///
/// Re-registering a path replaces the earlier handler (last one wins).
#[derive(Default)]
pub struct Registry {
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `handler` to `/api/<path>`.
    pub fn register<H: Handler>(&mut self, path: &str, handler: H) {
        let route = format!("{API_PREFIX}{}", path.trim_start_matches('/'));
        if self.handlers.insert(route.clone(), Arc::new(handler)).is_some() {
            warn!(
                route = %route,
                total_handlers = self.handlers.len(),
                "Replaced existing handler"
            );
        } else {
            info!(
                route = %route,
                total_handlers = self.handlers.len(),
                "Handler registered"
            );
        }
    }

    /// Handler bound to the full request path (e.g. `/api/register`).
    #[must_use]
    pub fn get(&self, route: &str) -> Option<&Arc<dyn Handler>> {
        self.handlers.get(route)
    }

    #[must_use]
    pub fn contains(&self, route: &str) -> bool {
        self.handlers.contains_key(route)
    }

    /// Registered routes, sorted.
    #[must_use]
    pub fn routes(&self) -> Vec<&str> {
        let mut routes: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        routes.sort_unstable();
        routes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// API request as seen by the dispatcher and middleware.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub request_id: RequestId,
    pub method: Method,
    /// Path without query string
    pub path: String,
    pub headers: HeaderVec,
    pub cookies: HeaderVec,
    pub body: Vec<u8>,
}

impl ApiRequest {
    /// Get a header by name (case-insensitive per RFC 7230)
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Get a cookie by name
    #[inline]
    #[must_use]
    pub fn get_cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Fully encoded API response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: HeaderVec,
    pub body: Vec<u8>,
}

impl ApiResponse {
    /// Response with a pre-encoded JSON body.
    #[must_use]
    pub fn json_bytes(status: u16, body: Vec<u8>) -> Self {
        let mut headers = HeaderVec::new();
        headers.push((Arc::from("content-type"), "application/json".to_string()));
        Self {
            status,
            headers,
            body,
        }
    }

    #[must_use]
    pub fn json(status: u16, body: &Value) -> Self {
        Self::json_bytes(status, body.to_string().into_bytes())
    }

    /// `{"error": "<status>"}` response used outside handler results.
    #[must_use]
    pub fn error(status: u16) -> Self {
        Self::json(status, &serde_json::json!({ ERROR_KEY: status.to_string() }))
    }

    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Add or replace a header.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value.into()));
    }
}

/// Runs the decode → resolve → invoke → map → encode pipeline.
///
/// Owns the read-only [`Registry`]; shared between connection coroutines
/// behind an `Arc` without locking.
pub struct Dispatcher {
    registry: Registry,
    resolver: AuthResolver,
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(registry: Registry, resolver: AuthResolver) -> Self {
        Self {
            registry,
            resolver,
            middlewares: Vec::new(),
        }
    }

    /// Add middleware; executed in insertion order.
    pub fn add_middleware(&mut self, mw: Arc<dyn Middleware>) {
        self.middlewares.push(mw);
    }

    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    #[must_use]
    pub fn handles(&self, path: &str) -> bool {
        self.registry.contains(path)
    }

    /// Dispatch an API request.
    ///
    /// Returns `None` when no handler is bound to the request path. Every
    /// other outcome, including a handler panic, becomes a response.
    #[must_use]
    pub fn dispatch(&self, request: &ApiRequest) -> Option<ApiResponse> {
        let Some(handler) = self.registry.get(&request.path) else {
            debug!(
                request_id = %request.request_id,
                path = %request.path,
                available_handlers = self.registry.len(),
                "No handler for API path"
            );
            return None;
        };

        let mut early_resp: Option<ApiResponse> = None;
        for mw in &self.middlewares {
            if early_resp.is_none() {
                early_resp = mw.before(request);
            } else {
                let _ = mw.before(request);
            }
        }

        let start = Instant::now();
        let mut resp = match early_resp {
            Some(resp) => resp,
            None => self.invoke(handler.as_ref(), request),
        };
        let latency = start.elapsed();

        for mw in &self.middlewares {
            mw.after(request, &mut resp, latency);
        }
        resp.set_header(REQUEST_ID_HEADER, request.request_id.to_string());
        Some(resp)
    }

    fn invoke(&self, handler: &dyn Handler, request: &ApiRequest) -> ApiResponse {
        let map = RequestMap::decode(&request.body);
        let identity = self
            .resolver
            .resolve(request.get_cookie(crate::security::SESSION_COOKIE), &map);

        debug!(
            request_id = %request.request_id,
            path = %request.path,
            fields = map.len(),
            authenticated = identity.authenticated,
            "Invoking handler"
        );

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            handler.call(&map, &identity.username, identity.authenticated)
        }));

        let result = match outcome {
            Ok(result) => result,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(
                    request_id = %request.request_id,
                    path = %request.path,
                    panic_message = %message,
                    "Handler panicked"
                );
                Err(ApiError::unknown(format!("handler panicked: {message}")))
            }
        };

        match result {
            Ok(payload) => {
                let (status, body) = encode_payload(&payload);
                ApiResponse::json_bytes(status, body)
            }
            Err(err) => map_error(&err, request.request_id, &request.path),
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Latency helper for middleware that want milliseconds.
#[must_use]
pub fn latency_ms(latency: Duration) -> u64 {
    u64::try_from(latency.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::codec::payload;
    use crate::security::SessionStore;
    use serde_json::json;

    fn request(path: &str, body: &str) -> ApiRequest {
        ApiRequest {
            request_id: RequestId::new(),
            method: Method::POST,
            path: path.to_string(),
            headers: HeaderVec::new(),
            cookies: HeaderVec::new(),
            body: body.as_bytes().to_vec(),
        }
    }

    fn dispatcher_with(registry: Registry) -> (Dispatcher, Arc<SessionStore>) {
        let sessions = Arc::new(SessionStore::new());
        let resolver = AuthResolver::new(Arc::clone(&sessions));
        (Dispatcher::new(registry, resolver), sessions)
    }

    fn body_of(resp: &ApiResponse) -> Value {
        serde_json::from_slice(&resp.body).unwrap()
    }

    #[test]
    fn test_register_prefixes_api_path() {
        let mut registry = Registry::new();
        let empty = |_: &RequestMap, _: &str, _: bool| -> HandlerResult { Ok(Payload::new()) };
        registry.register("echo", empty);
        registry.register("/ping", empty);
        assert_eq!(registry.routes(), vec!["/api/echo", "/api/ping"]);
    }

    #[test]
    fn test_last_registration_wins() {
        let mut registry = Registry::new();
        registry.register("v", |_: &RequestMap, _: &str, _: bool| -> HandlerResult {
            Ok(payload(json!({"version": 1})))
        });
        registry.register("v", |_: &RequestMap, _: &str, _: bool| -> HandlerResult {
            Ok(payload(json!({"version": 2})))
        });
        assert_eq!(registry.len(), 1);
        let (dispatcher, _) = dispatcher_with(registry);
        let resp = dispatcher.dispatch(&request("/api/v", "")).unwrap();
        assert_eq!(body_of(&resp), json!({"version": 2}));
    }

    #[test]
    fn test_unregistered_path_is_none() {
        let (dispatcher, _) = dispatcher_with(Registry::new());
        assert!(dispatcher.dispatch(&request("/api/missing", "{}")).is_none());
    }

    #[test]
    fn test_handler_receives_map_and_identity() {
        let mut registry = Registry::new();
        registry.register("whoami", |req: &RequestMap, user: &str, auth: bool| -> HandlerResult {
            Ok(payload(json!({
                "user": user,
                "auth": auth,
                "echo": req.get_str("echo"),
            })))
        });
        let (dispatcher, sessions) = dispatcher_with(registry);

        let resp = dispatcher
            .dispatch(&request("/api/whoami", r#"{"username":"mallory","echo":"hi"}"#))
            .unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(body_of(&resp), json!({"user": "mallory", "auth": false, "echo": "hi"}));

        let token = sessions.create("alice");
        let body = format!(r#"{{"username":"alice","token":"{token}"}}"#);
        let resp = dispatcher.dispatch(&request("/api/whoami", &body)).unwrap();
        assert_eq!(body_of(&resp), json!({"user": "alice", "auth": true, "echo": ""}));
    }

    #[test]
    fn test_malformed_body_still_reaches_handler() {
        let mut registry = Registry::new();
        registry.register("need", |req: &RequestMap, _: &str, _: bool| -> HandlerResult {
            if req.get_str("field").is_empty() {
                return Err(ApiError::validation());
            }
            Ok(Payload::new())
        });
        let (dispatcher, _) = dispatcher_with(registry);
        let resp = dispatcher.dispatch(&request("/api/need", "{not json")).unwrap();
        assert_eq!(resp.status, 400);
        assert_eq!(body_of(&resp), json!({"error": "400"}));
    }

    #[test]
    fn test_panic_maps_to_opaque_500() {
        let mut registry = Registry::new();
        registry.register("boom", |_: &RequestMap, _: &str, _: bool| -> HandlerResult {
            panic!("secret connection string")
        });
        let (dispatcher, _) = dispatcher_with(registry);
        let resp = dispatcher.dispatch(&request("/api/boom", "")).unwrap();
        assert_eq!(resp.status, 500);
        assert_eq!(body_of(&resp), json!({"error": "500"}));
        assert!(resp.get_header(REQUEST_ID_HEADER).is_some());
    }

    struct Deny;

    impl Middleware for Deny {
        fn before(&self, _req: &ApiRequest) -> Option<ApiResponse> {
            Some(ApiResponse::error(403))
        }
    }

    #[test]
    fn test_middleware_short_circuits() {
        let mut registry = Registry::new();
        registry.register("x", |_: &RequestMap, _: &str, _: bool| -> HandlerResult {
            Ok(payload(json!({"reached": true})))
        });
        let (mut dispatcher, _) = dispatcher_with(registry);
        dispatcher.add_middleware(Arc::new(Deny));
        let resp = dispatcher.dispatch(&request("/api/x", "")).unwrap();
        assert_eq!(resp.status, 403);
        assert_eq!(body_of(&resp), json!({"error": "403"}));
    }
}
