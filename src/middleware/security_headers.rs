//! Fixed hardening headers sent with every response.

use crate::dispatcher::HeaderVec;
use std::sync::Arc;

/// `(name, value)` pairs, lowercase names.
pub const SECURITY_HEADERS: [(&str, &str); 5] = [
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "DENY"),
    ("referrer-policy", "no-referrer"),
    ("x-xss-protection", "1; mode=block"),
    ("content-security-policy", "frame-ancestors 'none'"),
];

/// Set every security header, replacing any value already present.
pub fn apply_security_headers(headers: &mut HeaderVec) {
    for (name, value) in SECURITY_HEADERS {
        headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        headers.push((Arc::from(name), value.to_string()));
    }
}
