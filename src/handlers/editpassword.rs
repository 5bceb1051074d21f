use super::Services;
use crate::dispatcher::{payload, ApiError, HandlerResult, RequestMap};
use serde_json::json;
use tracing::info;

/// Replace the caller's password. Requires an authenticated session.
pub fn editpassword(
    services: &Services,
    request: &RequestMap,
    username: &str,
    authenticated: bool,
) -> HandlerResult {
    if !authenticated {
        return Err(ApiError::authorization());
    }

    let new_password = request.get_str("newPassword");
    if new_password.is_empty() {
        return Err(ApiError::validation());
    }

    let hash = services.hasher.hash(new_password)?;
    if services.users.update_password(username, &hash)? == 0 {
        return Err(ApiError::not_found().with_detail(format!("no user {username}")));
    }
    info!(username = %username, "Password changed");
    Ok(payload(json!({ "success": true })))
}
