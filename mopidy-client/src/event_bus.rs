//! Local event bus
//!
//! The session publishes its own lifecycle (`socket:connect`, `socket:error`,
//! `socket:close`, `state:online`) and every server-pushed event
//! (`event:<camelCaseName>`) through an [`EventBus`].
//!
//! # Dispatch Rules
//!
//! - Handlers for one event run in registration order.
//! - Registering the same handler twice makes it run twice.
//! - Handlers are plain synchronous closures; they run on the task that
//!   emits, one after the other. A panicking handler is not caught.
//! - `emit` dispatches to a snapshot of the handler list, so handlers may
//!   add or remove handlers (from a spawned task) without deadlocking.
//!
//! # Examples
//!
//! ```rust
//! use mopidy_client::EventBus;
//! use serde_json::json;
//!
//! # async fn example() {
//! let bus = EventBus::new();
//! let handler = bus.on("event:volumeChanged", |payload| {
//!     println!("volume is now {}", payload["volume"]);
//! }).await;
//!
//! bus.emit("event:volumeChanged", &json!({"volume": 40})).await;
//! bus.off(Some("event:volumeChanged"), Some(&handler)).await;
//! # }
//! ```

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Shared handle to a registered handler; identity is the allocation
pub type EventHandler = Arc<dyn Fn(&Value) + Send + Sync>;

/// Emitted once the transport is open, before introspection
pub const SOCKET_CONNECT: &str = "socket:connect";
/// Emitted with `{"message": <detail>}` when the transport reports an error
pub const SOCKET_ERROR: &str = "socket:error";
/// Emitted when the transport closes, before the reconnect delay starts
pub const SOCKET_CLOSE: &str = "socket:close";
/// Emitted once the generated API has been installed
pub const STATE_ONLINE: &str = "state:online";

/// Registry of named-event subscribers
#[derive(Clone, Default)]
pub struct EventBus {
    handlers: Arc<Mutex<HashMap<String, Vec<EventHandler>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a closure for `event` and return its handle
    ///
    /// Keep the handle to remove exactly this registration later.
    pub async fn on<F>(&self, event: impl Into<String>, handler: F) -> EventHandler
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let handler: EventHandler = Arc::new(handler);
        self.add_handler(event, Arc::clone(&handler)).await;
        handler
    }

    /// Register an existing handle (again) for `event`
    pub async fn add_handler(&self, event: impl Into<String>, handler: EventHandler) {
        self.handlers
            .lock()
            .await
            .entry(event.into())
            .or_default()
            .push(handler);
    }

    /// Remove subscriptions
    ///
    /// - `off(None, _)` clears every event
    /// - `off(Some(event), None)` clears one event
    /// - `off(Some(event), Some(handler))` removes every registration of that
    ///   handle for that event; unknown handles are ignored
    pub async fn off(&self, event: Option<&str>, handler: Option<&EventHandler>) {
        let mut handlers = self.handlers.lock().await;

        let Some(event) = event else {
            handlers.clear();
            return;
        };

        match handler {
            None => {
                handlers.remove(event);
            }
            Some(target) => {
                if let Some(list) = handlers.get_mut(event) {
                    list.retain(|h| !same_handler(h, target));
                }
            }
        }
    }

    /// Invoke every handler registered for `event`, in order
    pub async fn emit(&self, event: &str, payload: &Value) {
        let snapshot = match self.handlers.lock().await.get(event) {
            Some(list) if !list.is_empty() => list.clone(),
            _ => {
                tracing::trace!(event = %event, "No handlers for event");
                return;
            }
        };

        for handler in snapshot {
            handler(payload);
        }
    }

    /// Number of registrations for `event`
    pub async fn handler_count(&self, event: &str) -> usize {
        self.handlers.lock().await.get(event).map_or(0, Vec::len)
    }

    /// Events that currently have at least one handler
    pub async fn event_names(&self) -> Vec<String> {
        self.handlers
            .lock()
            .await
            .iter()
            .filter(|(_, list)| !list.is_empty())
            .map(|(name, _)| name.clone())
            .collect()
    }
}

fn same_handler(a: &EventHandler, b: &EventHandler) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}
