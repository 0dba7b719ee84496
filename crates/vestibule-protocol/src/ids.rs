//! Identifier types and id generation.
//!
//! Rooms, sessions, and processes are all addressed by opaque short ids.
//! Ids are drawn from a URL-safe alphabet so they can appear verbatim in
//! WebSocket paths and presence channel names.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Alphabet for generated ids. Matches the URL path grammar
/// `[a-zA-Z0-9_-]+` so an id never needs escaping.
const ID_ALPHABET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789_-";

/// Length of generated room and process ids. 64^9 values make a
/// collision across a fleet negligible.
const SHORT_ID_LEN: usize = 9;

/// Length of generated session ids.
const SESSION_ID_LEN: usize = 16;

/// Generates a random id of `len` characters from the URL-safe alphabet.
pub fn random_id(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| {
            let idx = rng.random_range(0..ID_ALPHABET.len());
            ID_ALPHABET[idx] as char
        })
        .collect()
}

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident, $len:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wraps an existing id string.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Generates a fresh random id.
            pub fn generate() -> Self {
                Self(random_id($len))
            }

            /// Returns the id as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns `true` if every character is in the URL path
            /// grammar `[a-zA-Z0-9_-]+` and the id is non-empty.
            pub fn is_valid(&self) -> bool {
                !self.0.is_empty()
                    && self
                        .0
                        .bytes()
                        .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }
    };
}

id_type!(
    /// A unique identifier for a room. One process in the fleet owns the
    /// room; every process can address it by this id.
    RoomId,
    SHORT_ID_LEN
);

id_type!(
    /// A unique identifier for a client session. A fresh session id is
    /// issued for every successful seat reservation and is never reused.
    SessionId,
    SESSION_ID_LEN
);

id_type!(
    /// A unique identifier for a server process in the fleet.
    ProcessId,
    SHORT_ID_LEN
);
