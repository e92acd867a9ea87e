//! Reconnecting Mopidy client over WebSocket
//!
//! This crate talks to the JSON-RPC API that a Mopidy music server exposes
//! on `/mopidy/ws`. It keeps the connection alive, builds a navigable API
//! from the server's own description, and republishes server events locally.
//!
//! # Core Features
//!
//! - **Session**: one background task per session opens, reads and reopens the socket
//! - **Generated API**: `core.describe` becomes a tree like `api.lookup("tracklist.getTlTracks")`
//! - **Raw calls**: [`Session::call`] works for any method as soon as the socket is open
//! - **Events**: server events arrive as `event:<camelCaseName>` on the [`EventBus`]
//! - **Fixed-delay reconnect**: 5 seconds by default, configurable or disabled
//! - **Observability**: tracing spans and OpenTelemetry metrics
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use mopidy_client::{Session, STATE_ONLINE};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = Session::connect("ws://localhost:6680/mopidy/ws").await?;
//!
//!     session.on(STATE_ONLINE, |_| println!("API ready")).await;
//!     session.on("event:playbackStateChanged", |payload| {
//!         println!("{} -> {}", payload["old_state"], payload["new_state"]);
//!     }).await;
//!
//!     let mut params = serde_json::Map::new();
//!     params.insert("volume".into(), json!(50));
//!     session.call("core.mixer.set_volume", Some(params)).await?;
//!
//!     session.close().await;
//!     Ok(())
//! }
//! ```

pub mod api;
mod connection_state;
mod event_bus;
mod metrics;
mod reconnect;
mod request;
mod session;
mod session_builder;

pub use connection_state::{ConnectionManager, ConnectionState};
pub use event_bus::{EventBus, EventHandler, SOCKET_CLOSE, SOCKET_CONNECT, SOCKET_ERROR, STATE_ONLINE};
pub use metrics::ClientMetrics;
pub use reconnect::{FixedDelay, NoReconnect, ReconnectionStrategy, DEFAULT_RECONNECT_DELAY};
pub use request::{PendingRequestTable, PendingResponse};
pub use session::{Api, ApiFuture, Session};
pub use session_builder::SessionBuilder;
