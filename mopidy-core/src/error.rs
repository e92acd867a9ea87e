//! Error types for the Mopidy client
//!
//! Two types live here:
//!
//! - **Error**: everything a caller of the session can observe (uses thiserror)
//! - **JsonRpcErrorData**: the `error` object a Mopidy server puts in a failed response
//!
//! # Error Categories
//!
//! - **Transport**: NotConnected, ConnectionLost, WebSocket
//! - **Shutdown**: Closed
//! - **Protocol**: Parse, JsonRpc, Introspection
//! - **Processing**: Serialization, Internal
//!
//! `Error` is `Clone` because a single failure (a dropped socket, an explicit
//! close) is delivered to every request that is still waiting for an answer.
//!
//! # Examples
//!
//! ```rust
//! use mopidy_core::{Error, JsonRpcErrorData};
//!
//! let error = Error::NotConnected;
//! assert_eq!(error.to_string(), "Socket is not connected");
//!
//! let remote = JsonRpcErrorData::new(-32601, "Method not found");
//! assert_eq!(Error::from(remote).to_string(), "JSON-RPC error: [-32601] Method not found");
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type used across the mopidy crates
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong between a caller and the Mopidy server
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// A call was attempted while the socket was not open
    ///
    /// Returned immediately, the transport is never touched.
    #[error("Socket is not connected")]
    NotConnected,

    /// The session was closed by its owner
    ///
    /// Every request still pending at the time of the close fails with this.
    #[error("Socket has been closed")]
    Closed,

    /// The socket dropped before a response arrived
    #[error("Connection lost before a response arrived")]
    ConnectionLost,

    /// WebSocket transport failure (connect, send, or protocol violation)
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// A value could not be converted to or from JSON
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// An inbound frame was not valid JSON
    #[error("Parse error: {0}")]
    Parse(String),

    /// The server answered with an `error` object
    #[error("JSON-RPC error: {0}")]
    JsonRpc(#[from] JsonRpcErrorData),

    /// The `core.describe` catalog could not be interpreted
    #[error("Introspection failed: {0}")]
    Introspection(String),

    /// Anything else that should not happen
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

/// The `error` member of a failed JSON-RPC response
///
/// Mopidy fills `data` with the Python exception type, message and traceback,
/// so it is kept as an opaque JSON value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcErrorData {
    /// Numeric error code (-32768..-32000 are reserved by JSON-RPC 2.0)
    pub code: i32,

    /// Short human-readable description
    pub message: String,

    /// Additional server-provided details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl JsonRpcErrorData {
    /// Create an error object with a code and message
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Create an error object carrying extra data
    pub fn with_data(code: i32, message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            code,
            message: message.into(),
            data: Some(data),
        }
    }
}

impl std::fmt::Display for JsonRpcErrorData {
    /// Formats as "[code] message", e.g. "[-32601] Method not found"
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for JsonRpcErrorData {}
