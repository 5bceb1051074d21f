//! Request codec: JSON body → [`RequestMap`], success payload → JSON body.
//!
//! Decoding never fails. A body that is empty, malformed, or valid JSON but
//! not an object yields an empty map; handlers validate their own required
//! fields through the zero-value accessors.

use serde_json::{Map, Value};
use tracing::{debug, error};

/// Success payload returned by a business handler: a JSON object.
pub type Payload = Map<String, Value>;

/// Body written when a success payload cannot be serialized.
pub const FALLBACK_ERROR_BODY: &[u8] = br#"{"error":"500"}"#;

/// Schema-less view of a decoded request body.
///
/// Keys are case-sensitive. Every typed accessor returns the zero value of
/// its type when the key is missing or holds a different type, so a lookup
/// can never crash a handler. Zero values mean "not provided".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestMap(Map<String, Value>);

impl RequestMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a raw request body.
    #[must_use]
    pub fn decode(body: &[u8]) -> Self {
        if body.is_empty() {
            return Self::default();
        }
        match serde_json::from_slice::<Value>(body) {
            Ok(Value::Object(map)) => Self(map),
            Ok(other) => {
                debug!(json_type = json_type(&other), "Request body is not a JSON object");
                Self::default()
            }
            Err(e) => {
                debug!(error = %e, body_len = body.len(), "Request body is not valid JSON");
                Self::default()
            }
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// String value, `""` when absent or not a string.
    #[must_use]
    pub fn get_str(&self, key: &str) -> &str {
        self.0.get(key).and_then(Value::as_str).unwrap_or("")
    }

    /// Integer value, `0` when absent or not an integer.
    #[must_use]
    pub fn get_i64(&self, key: &str) -> i64 {
        self.0.get(key).and_then(Value::as_i64).unwrap_or(0)
    }

    /// Floating point value, `0.0` when absent or not a number.
    #[must_use]
    pub fn get_f64(&self, key: &str) -> f64 {
        self.0.get(key).and_then(Value::as_f64).unwrap_or(0.0)
    }

    /// Boolean value, `false` when absent or not a boolean.
    #[must_use]
    pub fn get_bool(&self, key: &str) -> bool {
        self.0.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    /// Nested object, empty when absent or not an object.
    #[must_use]
    pub fn get_map(&self, key: &str) -> RequestMap {
        match self.0.get(key) {
            Some(Value::Object(map)) => RequestMap(map.clone()),
            _ => RequestMap::default(),
        }
    }

    /// String elements of an array; non-string elements are skipped.
    #[must_use]
    pub fn get_str_list(&self, key: &str) -> Vec<&str> {
        self.0
            .get(key)
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for RequestMap {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Build a [`Payload`] from a `json!` object literal.
///
/// Non-object values produce an empty payload.
#[must_use]
pub fn payload(value: Value) -> Payload {
    match value {
        Value::Object(map) => map,
        other => {
            debug!(json_type = json_type(&other), "Discarding non-object payload");
            Payload::new()
        }
    }
}

/// Serialize a success payload. Returns the status and body to send.
#[must_use]
pub fn encode_payload(payload: &Payload) -> (u16, Vec<u8>) {
    match serde_json::to_vec(payload) {
        Ok(body) => (200, body),
        Err(e) => {
            error!(error = %e, "Failed to serialize handler payload");
            (500, FALLBACK_ERROR_BODY.to_vec())
        }
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
