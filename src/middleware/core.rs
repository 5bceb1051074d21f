use std::time::Duration;

use crate::dispatcher::{ApiRequest, ApiResponse};

/// Hooks run by the dispatcher around a handler call.
///
/// `before` may answer the request itself; the first middleware to return a
/// response wins and the handler is skipped. `after` sees every response,
/// including early ones.
pub trait Middleware: Send + Sync {
    fn before(&self, _req: &ApiRequest) -> Option<ApiResponse> {
        None
    }
    fn after(&self, _req: &ApiRequest, _res: &mut ApiResponse, _latency: Duration) {}
}
