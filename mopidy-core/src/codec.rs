//! Codec for Mopidy frames
//!
//! Encoding is plain serde. Decoding is a two-step affair: the text is parsed
//! into a generic JSON value first, then classified by shape, because Mopidy
//! mixes responses and events on the same socket without a type tag.
//!
//! # Classification
//!
//! - has an `id` member → [`ServerMessage::Response`]
//! - has an `event` member (and no `id`) → [`ServerMessage::Event`]
//! - anything else → [`ServerMessage::Unrecognized`]
//!
//! # Examples
//!
//! ```rust
//! use mopidy_core::{codec, ServerMessage};
//!
//! let msg = codec::decode(r#"{"event":"volume_changed","volume":42}"#).unwrap();
//! match msg {
//!     ServerMessage::Event(event) => {
//!         assert_eq!(event.name, "volume_changed");
//!         assert_eq!(event.payload["volume"], 42);
//!         assert!(!event.payload.contains_key("event"));
//!     }
//!     other => panic!("unexpected {other:?}"),
//! }
//! ```

use crate::error::{Error, JsonRpcErrorData, Result};
use crate::types::{Catalog, JsonRpcRequest, JsonRpcResponse, MethodDescription, ServerEvent, ServerMessage};
use serde::Serialize;
use serde_json::Value;

/// Encode any serializable message to a JSON string
pub fn encode<T: Serialize>(msg: &T) -> Result<String> {
    serde_json::to_string(msg).map_err(|e| Error::Serialization(e.to_string()))
}

/// Encode a request envelope
pub fn encode_request(req: &JsonRpcRequest) -> Result<String> {
    encode(req)
}

/// Parse and classify one inbound text frame
///
/// # Errors
///
/// Returns `Error::Parse` if the text is not JSON at all. Well-formed JSON of
/// an unexpected shape is not an error; it comes back as `Unrecognized`.
pub fn decode(data: &str) -> Result<ServerMessage> {
    let value: Value = serde_json::from_str(data).map_err(|e| Error::Parse(e.to_string()))?;
    Ok(classify(value))
}

/// Classify an already-parsed frame
pub fn classify(value: Value) -> ServerMessage {
    let mut map = match value {
        Value::Object(map) => map,
        other => return ServerMessage::Unrecognized(other),
    };

    if let Some(id) = map.remove("id") {
        let error = map.remove("error").map(|raw| {
            serde_json::from_value::<JsonRpcErrorData>(raw.clone())
                .unwrap_or_else(|_| JsonRpcErrorData::with_data(-32603, "Malformed error object", raw))
        });
        return ServerMessage::Response(JsonRpcResponse {
            jsonrpc: map.remove("jsonrpc").and_then(|v| v.as_str().map(str::to_owned)),
            id,
            result: map.remove("result"),
            error,
        });
    }

    match map.remove("event") {
        Some(Value::String(name)) => ServerMessage::Event(ServerEvent { name, payload: map }),
        Some(other) => {
            map.insert("event".to_string(), other);
            ServerMessage::Unrecognized(Value::Object(map))
        }
        None => ServerMessage::Unrecognized(Value::Object(map)),
    }
}

/// Interpret the result of `core.describe`
///
/// Entries keep the order the server sent them in, and each entry's `name` is
/// filled in from its key.
///
/// # Errors
///
/// Returns `Error::Introspection` when the value is not an object of method
/// descriptions.
pub fn decode_catalog(value: Value) -> Result<Catalog> {
    let Value::Object(entries) = value else {
        return Err(Error::Introspection(
            "catalog is not an object of method descriptions".to_string(),
        ));
    };

    entries
        .into_iter()
        .map(|(name, description)| {
            let mut method: MethodDescription = serde_json::from_value(description)
                .map_err(|e| Error::Introspection(format!("{name}: {e}")))?;
            method.name = name;
            Ok(method)
        })
        .collect()
}
