//! Request path routing.
//!
//! A path containing a `matchmake` segment is a matchmake request with
//! the method and room type as the two following segments; anything
//! else is a room join of the form `/<name>/<roomId>?sessionId=<id>`.

use vestibule_protocol::{RoomId, SessionId};

use crate::TransportError;

/// A parsed transport route.
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    Matchmake {
        method: String,
        name: String,
    },
    RoomJoin {
        name: String,
        room_id: RoomId,
        session_id: SessionId,
    },
}

impl Route {
    /// Parses the upgrade request's path and query.
    pub fn parse(path: &str, query: Option<&str>) -> Result<Self, TransportError> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        if let Some(pos) = segments.iter().position(|s| *s == "matchmake") {
            if segments.len() != pos + 3 {
                return Err(TransportError::InvalidPath(format!(
                    "matchmake path needs /matchmake/<method>/<name>, got '{path}'"
                )));
            }
            return Ok(Self::Matchmake {
                method: segments[pos + 1].to_string(),
                name: segments[pos + 2].to_string(),
            });
        }

        if segments.len() < 2 {
            return Err(TransportError::InvalidPath(format!(
                "room join path needs /<name>/<roomId>, got '{path}'"
            )));
        }
        let room_id = RoomId::new(segments[segments.len() - 1]);
        if !room_id.is_valid() {
            return Err(TransportError::InvalidPath(format!(
                "invalid room id '{room_id}'"
            )));
        }
        let name = segments[segments.len() - 2].to_string();
        let session_id = query
            .and_then(|query| {
                query
                    .split('&')
                    .find_map(|pair| pair.strip_prefix("sessionId="))
            })
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                TransportError::InvalidPath("room join requires ?sessionId=".to_string())
            })?;

        Ok(Self::RoomJoin {
            name,
            room_id,
            session_id: SessionId::new(session_id),
        })
    }
}
