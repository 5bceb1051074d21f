//! Handler registry: binds the forum's business handlers to `/api/` paths
//! and assembles the dispatcher around them.

use crate::dispatcher::{Dispatcher, HandlerResult, Registry, RequestMap};
use crate::handlers::{editpassword, login, logout, register, Services};
use crate::middleware::TracingMiddleware;
use crate::security::AuthResolver;
use std::sync::Arc;

type BoundHandler = fn(&Services, &RequestMap, &str, bool) -> HandlerResult;

/// `(path, handler)` pairs mounted by [`register_all`].
pub const HANDLERS: [(&str, BoundHandler); 4] = [
    ("register", register),
    ("editpassword", editpassword),
    ("login", login),
    ("logout", logout),
];

/// Register every business handler, each holding a share of `services`.
pub fn register_all(registry: &mut Registry, services: &Arc<Services>) {
    for (path, handler) in HANDLERS {
        let services = Arc::clone(services);
        registry.register(path, move |req: &RequestMap, user: &str, auth: bool| -> HandlerResult {
            handler(&services, req, user, auth)
        });
    }
}

/// Dispatcher with all handlers, session resolution and request logging.
#[must_use]
pub fn build_dispatcher(services: &Arc<Services>) -> Dispatcher {
    let mut registry = Registry::new();
    register_all(&mut registry, services);
    let resolver = AuthResolver::new(Arc::clone(&services.sessions));
    let mut dispatcher = Dispatcher::new(registry, resolver);
    dispatcher.add_middleware(Arc::new(TracingMiddleware));
    dispatcher
}
