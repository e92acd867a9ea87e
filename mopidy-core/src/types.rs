//! Wire types for the Mopidy JSON-RPC protocol
//!
//! Mopidy speaks JSON-RPC 2.0 over a WebSocket, with one extension: besides
//! responses, the server pushes *events*, objects carrying an `event` member
//! and no `id`.
//!
//! # Message Types
//!
//! 1. **Request** (client → server): `{"jsonrpc", "method", "id", "params"?}`
//! 2. **Response** (server → client): `{"jsonrpc", "id", "result" | "error"}`
//! 3. **Event** (server → client): `{"event", ...payload}`
//!
//! The method catalog returned by `core.describe` is modelled by
//! [`MethodDescription`] and [`ParameterSpec`].

use crate::error::{Error, JsonRpcErrorData, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Protocol version sent in every request envelope
pub const PROTOCOL_VERSION: &str = "2.0";

/// Method that returns the server's method catalog
pub const DESCRIBE_METHOD: &str = "core.describe";

/// Correlation id of an in-flight request
pub type RequestId = u64;

/// Keyword-style parameter bag
pub type Params = Map<String, Value>;

/// Catalog as returned by `core.describe`, in the order the server listed it
pub type Catalog = Vec<MethodDescription>;

/// JSON-RPC request sent to the server
///
/// `params` is omitted from the JSON entirely when `None`, which is how
/// Mopidy expects argument-less calls such as `core.describe`.
///
/// # Examples
///
/// ```rust
/// use mopidy_core::JsonRpcRequest;
///
/// let request = JsonRpcRequest::new("core.playback.pause", None, 7);
/// assert_eq!(request.jsonrpc, "2.0");
/// assert_eq!(request.id, 7);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// Always "2.0"
    pub jsonrpc: String,
    /// Dotted method name, e.g. "core.playback.seek"
    pub method: String,
    /// Correlation id
    pub id: RequestId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Params>,
}

impl JsonRpcRequest {
    pub fn new(method: impl Into<String>, params: Option<Params>, id: RequestId) -> Self {
        Self {
            jsonrpc: PROTOCOL_VERSION.to_string(),
            method: method.into(),
            id,
            params,
        }
    }
}

/// JSON-RPC response received from the server
///
/// `id` is kept as a raw JSON value: the server may echo `null` for requests
/// it could not parse, which simply never matches a pending request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jsonrpc: Option<String>,
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcErrorData>,
}

impl JsonRpcResponse {
    /// Build a successful response (mostly useful for tests and mock servers)
    pub fn success(result: Value, id: RequestId) -> Self {
        Self {
            jsonrpc: Some(PROTOCOL_VERSION.to_string()),
            id: Value::from(id),
            result: Some(result),
            error: None,
        }
    }

    /// Build an error response
    pub fn failure(error: JsonRpcErrorData, id: RequestId) -> Self {
        Self {
            jsonrpc: Some(PROTOCOL_VERSION.to_string()),
            id: Value::from(id),
            result: None,
            error: Some(error),
        }
    }

    /// The numeric correlation id, if the server sent one
    pub fn request_id(&self) -> Option<RequestId> {
        self.id.as_u64()
    }

    /// Turn the envelope into the outcome a caller sees
    ///
    /// An `error` member wins over `result`; a response with neither settles
    /// to `Value::Null`, matching methods that return `None` on the server.
    pub fn into_result(self) -> Result<Value> {
        match self.error {
            Some(error) => Err(Error::JsonRpc(error)),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

/// Event pushed by the server
///
/// `name` is the raw snake_case name (e.g. `track_playback_started`);
/// `payload` is the original object with the `event` member removed.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerEvent {
    pub name: String,
    pub payload: Map<String, Value>,
}

/// Any inbound frame, classified by shape
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    /// Carries an `id`
    Response(JsonRpcResponse),
    /// Carries an `event` and no `id`
    Event(ServerEvent),
    /// Neither of the above
    Unrecognized(Value),
}

/// One entry of the `core.describe` catalog
///
/// `name` is not part of the wire object (it is the catalog key); it is filled
/// in by [`crate::codec::decode_catalog`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MethodDescription {
    #[serde(default, skip_serializing)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub params: Vec<ParameterSpec>,
}

impl MethodDescription {
    pub fn new(name: impl Into<String>, params: Vec<ParameterSpec>) -> Self {
        Self {
            name: name.into(),
            description: None,
            params,
        }
    }

    /// Names of the positional parameters, in declaration order
    pub fn positional_names(&self) -> impl Iterator<Item = &str> {
        self.params.iter().filter_map(ParameterSpec::positional_name)
    }

    /// True when at least one positional parameter is declared
    pub fn takes_arguments(&self) -> bool {
        self.positional_names().next().is_some()
    }
}

/// One entry of a method's parameter list
///
/// Mopidy describes `**kwargs` as `{"name": "kwargs", "kwargs": true}`; that
/// entry only says that keyword arguments are accepted and never takes a
/// positional slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawParameter", into = "RawParameter")]
pub enum ParameterSpec {
    Positional {
        name: String,
        default: Option<Value>,
    },
    KeywordMarker,
}

impl ParameterSpec {
    pub fn positional(name: impl Into<String>) -> Self {
        ParameterSpec::Positional {
            name: name.into(),
            default: None,
        }
    }

    pub fn positional_name(&self) -> Option<&str> {
        match self {
            ParameterSpec::Positional { name, .. } => Some(name),
            ParameterSpec::KeywordMarker => None,
        }
    }

    pub fn is_keyword_marker(&self) -> bool {
        matches!(self, ParameterSpec::KeywordMarker)
    }
}

#[derive(Serialize, Deserialize)]
struct RawParameter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    kwargs: Option<bool>,
}

impl From<RawParameter> for ParameterSpec {
    fn from(raw: RawParameter) -> Self {
        if raw.kwargs == Some(true) {
            ParameterSpec::KeywordMarker
        } else {
            ParameterSpec::Positional {
                name: raw.name.unwrap_or_default(),
                default: raw.default,
            }
        }
    }
}

impl From<ParameterSpec> for RawParameter {
    fn from(spec: ParameterSpec) -> Self {
        match spec {
            ParameterSpec::Positional { name, default } => RawParameter {
                name: Some(name),
                default,
                kwargs: None,
            },
            ParameterSpec::KeywordMarker => RawParameter {
                name: Some("kwargs".to_string()),
                default: None,
                kwargs: Some(true),
            },
        }
    }
}
