//! Core types and codec for the Mopidy JSON-RPC protocol
//!
//! This crate holds everything about the protocol that does not need a socket:
//!
//! - **Types**: request/response envelopes, server events, the `core.describe` catalog
//! - **Codec**: encoding requests and classifying inbound frames
//! - **Naming**: snake_case → camelCase mapping and method path splitting
//! - **Error handling**: the error taxonomy shared by all mopidy crates
//! - **Observability**: tracing subscriber and OpenTelemetry bootstrap
//!
//! The `mopidy-client` crate builds the reconnecting session on top of it.
//!
//! # Example
//!
//! ```rust
//! use mopidy_core::{codec, JsonRpcRequest, ServerMessage};
//!
//! let request = JsonRpcRequest::new("core.playback.get_state", None, 1);
//! let text = codec::encode_request(&request).unwrap();
//! assert!(text.contains("\"method\":\"core.playback.get_state\""));
//!
//! let reply = codec::decode(r#"{"jsonrpc":"2.0","id":1,"result":"stopped"}"#).unwrap();
//! assert!(matches!(reply, ServerMessage::Response(_)));
//! ```

pub mod codec;
pub mod error;
pub mod naming;
pub mod observability;
pub mod types;

pub use error::{Error, JsonRpcErrorData, Result};
pub use observability::{init_observability, shutdown_observability, ObservabilityConfig};
pub use types::{
    Catalog, JsonRpcRequest, JsonRpcResponse, MethodDescription, ParameterSpec, Params, RequestId,
    ServerEvent, ServerMessage, DESCRIBE_METHOD, PROTOCOL_VERSION,
};
