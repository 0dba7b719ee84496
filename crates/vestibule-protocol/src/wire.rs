//! Client-facing wire messages.
//!
//! The matchmake endpoint speaks plain JSON: a request body of opaque
//! client options in, either a seat reservation or `{code, error}` out.
//! The seat reservation itself lives in the matchmaker crate because it
//! embeds the room listing; the failure shape is defined here.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Options sent by a client with a matchmaking request.
///
/// Treated as an opaque key/value bag: only handler filter projections
/// and user room hooks interpret it. Always the wire JSON, verbatim.
pub type ClientOptions = Value;

/// The failure body of a matchmake exchange: `{ "code": n, "error": "…" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(code: u16, error: impl Into<String>) -> Self {
        Self {
            code,
            error: error.into(),
        }
    }
}

/// Shallow-merges handler defaults over client options.
///
/// Both sides are expected to be JSON objects; on conflicting keys the
/// defaults win, so configuration registered with the room type cannot
/// be overridden from the wire. Client keys only fill the gaps. A
/// non-object on either side yields the defaults when present, the
/// client value otherwise.
pub fn merge_options(defaults: &Value, client: &Value) -> Value {
    match (defaults.as_object(), client.as_object()) {
        (Some(d), Some(c)) => {
            let mut merged = c.clone();
            for (key, value) in d {
                merged.insert(key.clone(), value.clone());
            }
            Value::Object(merged)
        }
        _ => {
            if defaults.is_null() {
                client.clone()
            } else {
                defaults.clone()
            }
        }
    }
}
