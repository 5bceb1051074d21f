//! Error taxonomy and status mapping for business handlers.
//!
//! Handlers fail by returning an [`ApiError`]. The dispatcher is the only
//! place that turns one into a response, via [`map_error`]. The client sees
//! `{"error": "<status>[ <reason>]"}`; the reason is a short machine-readable
//! token such as `captcha`. Internal detail is logged, never sent.

use super::core::{ApiResponse, ERROR_KEY};
use crate::ids::RequestId;
use serde_json::json;
use std::fmt;
use tracing::{debug, error};

/// Failure class of a handler result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Missing or invalid input
    Validation,
    /// Not authenticated or not allowed
    Authorization,
    /// The addressed entity does not exist
    NotFound,
    /// Data store or other collaborator failed
    Upstream,
    /// Anything else, including handler panics
    Unknown,
}

impl ErrorKind {
    /// HTTP status this kind maps to.
    #[must_use]
    pub const fn status(self) -> u16 {
        match self {
            ErrorKind::Validation => 400,
            ErrorKind::Authorization => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::Upstream | ErrorKind::Unknown => 500,
        }
    }

    /// Whether the client may see the public reason of this kind.
    #[must_use]
    pub const fn is_client_error(self) -> bool {
        self.status() < 500
    }
}

/// Typed handler error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    kind: ErrorKind,
    public_message: Option<String>,
    internal_detail: Option<String>,
}

impl ApiError {
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            public_message: None,
            internal_detail: None,
        }
    }

    #[must_use]
    pub fn validation() -> Self {
        Self::new(ErrorKind::Validation)
    }

    #[must_use]
    pub fn authorization() -> Self {
        Self::new(ErrorKind::Authorization)
    }

    #[must_use]
    pub fn not_found() -> Self {
        Self::new(ErrorKind::NotFound)
    }

    /// Collaborator failure; `detail` is logged and withheld from the client.
    #[must_use]
    pub fn upstream(detail: impl fmt::Display) -> Self {
        Self::new(ErrorKind::Upstream).with_detail(detail)
    }

    /// Unclassified failure; `detail` is logged and withheld from the client.
    #[must_use]
    pub fn unknown(detail: impl fmt::Display) -> Self {
        Self::new(ErrorKind::Unknown).with_detail(detail)
    }

    /// Attach a short machine-readable reason shown to the client
    /// (e.g. `captcha` → `"403 captcha"`). Ignored for server errors.
    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.public_message = Some(reason.into());
        self
    }

    #[must_use]
    pub fn with_detail(mut self, detail: impl fmt::Display) -> Self {
        self.internal_detail = Some(detail.to_string());
        self
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    #[must_use]
    pub fn status(&self) -> u16 {
        self.kind.status()
    }

    #[must_use]
    pub fn internal_detail(&self) -> Option<&str> {
        self.internal_detail.as_deref()
    }

    /// Client-visible error text: the status, plus the reason for 4xx kinds.
    #[must_use]
    pub fn public_text(&self) -> String {
        match (&self.public_message, self.kind.is_client_error()) {
            (Some(reason), true) => format!("{} {reason}", self.status()),
            _ => self.status().to_string(),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ({})", self.kind, self.status())?;
        if let Some(reason) = &self.public_message {
            write!(f, " {reason}")?;
        }
        if let Some(detail) = &self.internal_detail {
            write!(f, ": {detail}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ApiError {}

/// Convert a handler error into the response sent to the client.
///
/// Server-side kinds are logged at error level together with their internal
/// detail; client errors are logged at debug level.
#[must_use]
pub fn map_error(err: &ApiError, request_id: RequestId, handler: &str) -> ApiResponse {
    let status = err.status();
    if err.kind.is_client_error() {
        debug!(
            request_id = %request_id,
            handler = %handler,
            status = status,
            kind = ?err.kind,
            "Handler rejected request"
        );
    } else {
        error!(
            request_id = %request_id,
            handler = %handler,
            status = status,
            kind = ?err.kind,
            detail = err.internal_detail.as_deref().unwrap_or(""),
            "Handler failed"
        );
    }
    ApiResponse::json(status, &json!({ ERROR_KEY: err.public_text() }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn body_of(resp: &ApiResponse) -> Value {
        serde_json::from_slice(&resp.body).unwrap()
    }

    #[test]
    fn test_kind_statuses() {
        assert_eq!(ApiError::validation().status(), 400);
        assert_eq!(ApiError::authorization().status(), 403);
        assert_eq!(ApiError::not_found().status(), 404);
        assert_eq!(ApiError::upstream("db down").status(), 500);
        assert_eq!(ApiError::unknown("boom").status(), 500);
    }

    #[test]
    fn test_public_text_with_reason() {
        assert_eq!(ApiError::validation().public_text(), "400");
        assert_eq!(
            ApiError::authorization().with_reason("captcha").public_text(),
            "403 captcha"
        );
    }

    #[test]
    fn test_server_errors_hide_detail_and_reason() {
        let err = ApiError::upstream("connection refused: 10.0.0.5:5432").with_reason("db");
        assert_eq!(err.public_text(), "500");
        let resp = map_error(&err, RequestId::new(), "register");
        assert_eq!(resp.status, 500);
        assert_eq!(body_of(&resp), serde_json::json!({"error": "500"}));
        assert!(!String::from_utf8_lossy(&resp.body).contains("10.0.0.5"));
    }

    #[test]
    fn test_map_client_error() {
        let resp = map_error(
            &ApiError::authorization().with_reason("captcha"),
            RequestId::new(),
            "register",
        );
        assert_eq!(resp.status, 403);
        assert_eq!(resp.get_header("content-type"), Some("application/json"));
        assert_eq!(body_of(&resp), serde_json::json!({"error": "403 captcha"}));
    }

    #[test]
    fn test_display_includes_detail_for_logs() {
        let err = ApiError::unknown("handler panicked");
        assert_eq!(err.to_string(), "Unknown (500): handler panicked");
    }
}
