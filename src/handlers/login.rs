use super::Services;
use crate::dispatcher::{payload, ApiError, HandlerResult, RequestMap};
use serde_json::json;
use tracing::{debug, info};

/// Exchange username and password for a session token.
///
/// The token is returned in the body; clients present it back either as the
/// `session` cookie or as the `token` field next to `username`.
pub fn login(
    services: &Services,
    request: &RequestMap,
    _username: &str,
    _authenticated: bool,
) -> HandlerResult {
    let username = request.get_str("username");
    let password = request.get_str("password");
    if username.is_empty() || password.is_empty() {
        return Err(ApiError::validation());
    }

    let verified = match services.users.find(username)? {
        Some(user) => services.hasher.verify(password, &user.password_hash),
        None => {
            services.hasher.verify_decoy(password);
            false
        }
    };
    if !verified {
        debug!(username = %username, "Login rejected");
        return Ok(payload(json!({ "done": false })));
    }

    let token = services.sessions.create(username);
    info!(username = %username, "User logged in");
    Ok(payload(json!({ "done": true, "token": token })))
}

/// Revoke every session of the caller.
pub fn logout(
    services: &Services,
    _request: &RequestMap,
    username: &str,
    authenticated: bool,
) -> HandlerResult {
    if !authenticated {
        return Err(ApiError::authorization());
    }
    let removed = services.sessions.destroy_user(username);
    Ok(payload(json!({ "done": true, "sessions": removed })))
}
