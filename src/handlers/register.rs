use super::{Services, StoreError, UserRecord};
use crate::dispatcher::{payload, ApiError, HandlerResult, RequestMap};
use serde_json::json;
use tracing::info;

/// Longest accepted username.
pub const MAX_USERNAME_CHARS: usize = 32;

/// Format of [`UserRecord::registered`].
pub const REGISTERED_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Create an account.
///
/// The account name is always the body's `username` field, whoever the
/// caller is signed in as. Answers `{"done": false}` when the name is taken,
/// without writing.
pub fn register(
    services: &Services,
    request: &RequestMap,
    _username: &str,
    _authenticated: bool,
) -> HandlerResult {
    let username = request.get_str("username");
    let password = request.get_str("password");
    if username.is_empty() || password.is_empty() || username.chars().count() > MAX_USERNAME_CHARS {
        return Err(ApiError::validation());
    }

    if services.captcha_enabled
        && !services
            .captcha
            .verify(request.get_str("captcha"), request.get_str("captchaValue"))
    {
        return Err(ApiError::authorization().with_reason("captcha"));
    }

    if services.users.find(username)?.is_some() {
        return Ok(payload(json!({ "done": false })));
    }

    let record = UserRecord {
        username: username.to_string(),
        password_hash: services.hasher.hash(password)?,
        registered: chrono::Local::now().format(REGISTERED_FORMAT).to_string(),
    };
    match services.users.insert(record) {
        Ok(()) => {
            info!(username = %username, "User registered");
            Ok(payload(json!({ "done": true })))
        }
        Err(StoreError::Conflict(_)) => Ok(payload(json!({ "done": false }))),
        Err(e) => Err(e.into()),
    }
}
