use super::SessionLookup;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use dashmap::DashMap;
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::info;

/// Cookie carrying the session token.
pub const SESSION_COOKIE: &str = "session";

/// Random bytes per token (256 bits).
pub const TOKEN_BYTES: usize = 32;

/// In-process session table: token → username.
///
/// Sharded and lock-free for readers, so the resolver can run in every
/// connection coroutine concurrently while login/logout mutate it.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: DashMap<String, String>,
}

impl SessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a new token for `username` (base64url, no padding).
    pub fn create(&self, username: &str) -> String {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        let token = URL_SAFE_NO_PAD.encode(bytes);
        self.sessions.insert(token.clone(), username.to_string());
        info!(username = %username, live_sessions = self.sessions.len(), "Session created");
        token
    }

    /// Revoke one token. Returns whether it was live.
    pub fn destroy(&self, token: &str) -> bool {
        self.sessions.remove(token).is_some()
    }

    /// Revoke every token of `username`. Returns how many were removed.
    pub fn destroy_user(&self, username: &str) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, owner| owner != username);
        let removed = before.saturating_sub(self.sessions.len());
        info!(username = %username, removed = removed, "Sessions revoked");
        removed
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl SessionLookup for SessionStore {
    fn username_for(&self, token: &str) -> Option<String> {
        self.sessions.get(token).map(|entry| entry.value().clone())
    }
}
