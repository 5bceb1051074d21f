use std::time::Duration;

use tracing::{info, warn};

use super::Middleware;
use crate::dispatcher::{latency_ms, ApiRequest, ApiResponse};

/// Logs one line per API call with status and handler latency.
pub struct TracingMiddleware;

impl Middleware for TracingMiddleware {
    fn after(&self, req: &ApiRequest, res: &mut ApiResponse, latency: Duration) {
        if res.status >= 500 {
            warn!(
                request_id = %req.request_id,
                method = %req.method,
                path = %req.path,
                status = res.status,
                latency_ms = latency_ms(latency),
                "API request failed"
            );
        } else {
            info!(
                request_id = %req.request_id,
                method = %req.method,
                path = %req.path,
                status = res.status,
                latency_ms = latency_ms(latency),
                "API request completed"
            );
        }
    }
}
