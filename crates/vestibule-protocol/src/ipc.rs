//! IPC frames for cross-process room calls.
//!
//! Requests travel on the room's `$<roomId>` channel as the array
//! `[method, requestId, args]`; replies travel on `<roomId>:<requestId>`
//! as `[code, payload]` where a success payload is `[processId, value]`
//! and an error payload is a message string. Absent `args` means a
//! property read rather than a method invocation.

use serde_json::{json, Value};

use crate::codes::{IPC_ERROR, IPC_SUCCESS};
use crate::{ProcessId, ProtocolError};

/// A remote call request: `[method, requestId, args]`.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomCall {
    pub method: String,
    pub request_id: String,
    /// `None` requests a property read.
    pub args: Option<Vec<Value>>,
}

impl RoomCall {
    pub fn new(method: impl Into<String>, request_id: impl Into<String>, args: Option<Vec<Value>>) -> Self {
        Self {
            method: method.into(),
            request_id: request_id.into(),
            args,
        }
    }

    pub fn to_value(&self) -> Value {
        json!([self.method, self.request_id, self.args])
    }

    pub fn from_value(value: &Value) -> Result<Self, ProtocolError> {
        let arr = value
            .as_array()
            .ok_or_else(|| ProtocolError::InvalidFrame("room call is not an array".into()))?;
        let method = arr
            .first()
            .and_then(Value::as_str)
            .ok_or_else(|| ProtocolError::InvalidFrame("room call missing method".into()))?;
        let request_id = arr
            .get(1)
            .and_then(Value::as_str)
            .ok_or_else(|| ProtocolError::InvalidFrame("room call missing request id".into()))?;
        let args = match arr.get(2) {
            None | Some(Value::Null) => None,
            Some(Value::Array(args)) => Some(args.clone()),
            Some(other) => Some(vec![other.clone()]),
        };
        Ok(Self::new(method, request_id, args))
    }
}

/// A remote call reply: `[code, payload]`.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomCallReply {
    /// `[IPC_SUCCESS, [processId, value]]`
    Success { process_id: ProcessId, value: Value },
    /// `[IPC_ERROR, message]`
    Error(String),
}

impl RoomCallReply {
    pub fn success(process_id: ProcessId, value: Value) -> Self {
        Self::Success { process_id, value }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(message.into())
    }

    pub fn to_value(&self) -> Value {
        match self {
            Self::Success { process_id, value } => {
                json!([IPC_SUCCESS, [process_id, value]])
            }
            Self::Error(message) => json!([IPC_ERROR, message]),
        }
    }

    pub fn from_value(value: &Value) -> Result<Self, ProtocolError> {
        let arr = value
            .as_array()
            .ok_or_else(|| ProtocolError::InvalidFrame("room call reply is not an array".into()))?;
        let code = arr
            .first()
            .and_then(Value::as_u64)
            .ok_or_else(|| ProtocolError::InvalidFrame("room call reply missing code".into()))?;
        match code as u8 {
            c if c == IPC_SUCCESS => {
                let payload = arr
                    .get(1)
                    .and_then(Value::as_array)
                    .ok_or_else(|| ProtocolError::InvalidFrame("success payload is not an array".into()))?;
                let process_id = payload
                    .first()
                    .and_then(Value::as_str)
                    .ok_or_else(|| ProtocolError::InvalidFrame("success payload missing process id".into()))?;
                let value = payload.get(1).cloned().unwrap_or(Value::Null);
                Ok(Self::Success {
                    process_id: ProcessId::new(process_id),
                    value,
                })
            }
            c if c == IPC_ERROR => {
                let message = arr
                    .get(1)
                    .and_then(Value::as_str)
                    .unwrap_or("remote call failed");
                Ok(Self::Error(message.to_string()))
            }
            other => Err(ProtocolError::InvalidFrame(format!(
                "unknown reply code {other}"
            ))),
        }
    }
}
