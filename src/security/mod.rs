//! # Security Module
//!
//! Resolves who is calling an API endpoint.
//!
//! ## Overview
//!
//! The [`AuthResolver`] turns the session evidence of a request into an
//! [`Identity`] before the handler runs. It never fails: a request without a
//! valid session simply resolves to `authenticated = false`, and each handler
//! decides whether that is acceptable (public, read-only endpoints accept it).
//!
//! ## Session Evidence
//!
//! Checked in this order:
//!
//! 1. the `session` cookie carrying a token;
//! 2. the `token` field of the JSON body, together with the `username` field
//!    it was issued for (the form the bundled frontend sends).
//!
//! Tokens are minted by the login handler through [`SessionStore::create`]
//! and revoked by logout; the resolver only reads them.
//!
//! ## Trust
//!
//! When no session validates, the identity still carries the body's
//! `username` so that handlers such as registration can use it, but it is
//! client-asserted and must not authorize anything.

mod session;

pub use session::{SessionStore, SESSION_COOKIE, TOKEN_BYTES};

use crate::dispatcher::RequestMap;
use std::sync::Arc;
use tracing::debug;

/// Resolved caller of a single request. Never cached across requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub username: String,
    pub authenticated: bool,
}

impl Identity {
    /// Caller backed by a valid session.
    #[must_use]
    pub fn authenticated(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            authenticated: true,
        }
    }

    /// Caller without a valid session; `asserted` is whatever name the
    /// client claimed (possibly empty).
    #[must_use]
    pub fn anonymous(asserted: impl Into<String>) -> Self {
        Self {
            username: asserted.into(),
            authenticated: false,
        }
    }
}

/// Read access to issued session tokens.
pub trait SessionLookup: Send + Sync {
    /// Username the token was issued to, if the token is live.
    fn username_for(&self, token: &str) -> Option<String>;
}

/// Derives an [`Identity`] from request credentials.
#[derive(Clone)]
pub struct AuthResolver {
    sessions: Arc<dyn SessionLookup>,
}

impl AuthResolver {
    #[must_use]
    pub fn new<S: SessionLookup + 'static>(sessions: Arc<S>) -> Self {
        Self { sessions }
    }

    /// Resolve the caller from the session cookie or the body token.
    #[must_use]
    pub fn resolve(&self, session_cookie: Option<&str>, request: &RequestMap) -> Identity {
        if let Some(token) = session_cookie.filter(|t| !t.is_empty()) {
            if let Some(username) = self.sessions.username_for(token) {
                return Identity::authenticated(username);
            }
            debug!("Session cookie did not match a live session");
        }

        let asserted = request.get_str("username");
        let token = request.get_str("token");
        if !token.is_empty() && !asserted.is_empty() {
            match self.sessions.username_for(token) {
                Some(owner) if owner == asserted => return Identity::authenticated(owner),
                Some(_) => debug!(asserted = %asserted, "Body token belongs to another user"),
                None => debug!(asserted = %asserted, "Body token did not match a live session"),
            }
        }

        Identity::anonymous(asserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (AuthResolver, Arc<SessionStore>) {
        let sessions = Arc::new(SessionStore::new());
        (AuthResolver::new(Arc::clone(&sessions)), sessions)
    }

    fn body(json: &str) -> RequestMap {
        RequestMap::decode(json.as_bytes())
    }

    #[test]
    fn test_no_evidence_is_anonymous_empty() {
        let (resolver, _) = setup();
        assert_eq!(resolver.resolve(None, &RequestMap::new()), Identity::anonymous(""));
    }

    #[test]
    fn test_cookie_session() {
        let (resolver, sessions) = setup();
        let token = sessions.create("alice");
        let id = resolver.resolve(Some(&token), &body(r#"{"username":"bob"}"#));
        assert_eq!(id, Identity::authenticated("alice"));
    }

    #[test]
    fn test_body_token_must_match_username() {
        let (resolver, sessions) = setup();
        let token = sessions.create("alice");

        let ok = body(&format!(r#"{{"username":"alice","token":"{token}"}}"#));
        assert_eq!(resolver.resolve(None, &ok), Identity::authenticated("alice"));

        let stolen = body(&format!(r#"{{"username":"bob","token":"{token}"}}"#));
        assert_eq!(resolver.resolve(None, &stolen), Identity::anonymous("bob"));
    }

    #[test]
    fn test_unknown_tokens_are_not_errors() {
        let (resolver, _) = setup();
        let id = resolver.resolve(
            Some("forged"),
            &body(r#"{"username":"alice","token":"forged"}"#),
        );
        assert_eq!(id, Identity::anonymous("alice"));
    }

    #[test]
    fn test_revoked_session_stops_authenticating() {
        let (resolver, sessions) = setup();
        let token = sessions.create("alice");
        assert!(sessions.destroy(&token));
        assert!(!resolver.resolve(Some(&token), &RequestMap::new()).authenticated);
    }

    struct OneToken;

    impl SessionLookup for OneToken {
        fn username_for(&self, token: &str) -> Option<String> {
            (token == "t1").then(|| "carol".to_string())
        }
    }

    #[test]
    fn test_resolver_over_any_lookup() {
        let resolver = AuthResolver::new(Arc::new(OneToken));
        let carol = resolver.resolve(Some("t1"), &RequestMap::new());
        assert_eq!(carol, Identity::authenticated("carol"));
        assert!(!resolver.resolve(Some("t2"), &RequestMap::new()).authenticated);
    }
}
