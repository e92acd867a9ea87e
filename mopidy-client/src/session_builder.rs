//! Session builder for configuring reconnection and observability
//!
//! # Examples
//!
//! ```rust,no_run
//! use mopidy_client::SessionBuilder;
//! use std::time::Duration;
//!
//! # async fn example() -> mopidy_core::Result<()> {
//! // Faster reconnects than the 5 second default
//! let session = SessionBuilder::new("ws://localhost:6680/mopidy/ws")
//!     .reconnect_delay(Duration::from_secs(1))
//!     .connect()
//!     .await?;
//!
//! // With observability
//! let traced = SessionBuilder::new("ws://localhost:6680/mopidy/ws")
//!     .with_default_observability()
//!     .service_name("living-room-remote")
//!     .connect()
//!     .await?;
//! # Ok(())
//! # }
//! ```

use crate::event_bus::{EventBus, EventHandler};
use crate::metrics::ClientMetrics;
use crate::reconnect::{FixedDelay, NoReconnect, ReconnectionStrategy};
use crate::session::Session;
use mopidy_core::{Error, ObservabilityConfig, Result};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;

/// Builder for configuring and starting a [`Session`]
pub struct SessionBuilder {
    url: String,
    reconnect_strategy: Box<dyn ReconnectionStrategy>,
    observability_config: Option<ObservabilityConfig>,
    service_name: Option<String>,
    handlers: Vec<(String, EventHandler)>,
}

impl SessionBuilder {
    /// Defaults: reconnect every 5 seconds forever, no observability
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reconnect_strategy: Box::new(FixedDelay::default()),
            observability_config: None,
            service_name: None,
            handlers: Vec::new(),
        }
    }

    /// Reconnect after `delay`, forever
    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_strategy = Box::new(FixedDelay::new(delay));
        self
    }

    pub fn with_reconnect(mut self, strategy: Box<dyn ReconnectionStrategy>) -> Self {
        self.reconnect_strategy = strategy;
        self
    }

    /// Close the session the first time the connection drops
    pub fn without_reconnect(mut self) -> Self {
        self.reconnect_strategy = Box::new(NoReconnect);
        self
    }

    pub fn with_observability(mut self, config: ObservabilityConfig) -> Self {
        self.observability_config = Some(config);
        self
    }

    pub fn with_default_observability(mut self) -> Self {
        self.observability_config = Some(ObservabilityConfig::default());
        self
    }

    /// Subscribe before the session starts, so no lifecycle event is missed
    pub fn on<F>(mut self, event: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let handler: EventHandler = Arc::new(handler);
        self.handlers.push((event.into(), handler));
        self
    }

    /// Service name for observability (used if observability is enabled)
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = Some(name.into());
        self
    }

    /// Validate the URL, set up observability, and start the session
    ///
    /// The socket itself is opened by the session's background task, so an
    /// unreachable server is not an error here; it is retried like any drop.
    #[tracing::instrument(skip(self), fields(url = %self.url))]
    pub async fn connect(self) -> Result<Session> {
        self.url
            .as_str()
            .into_client_request()
            .map_err(|e| Error::WebSocket(format!("Invalid URL {}: {}", self.url, e)))?;

        let metrics = if let Some(mut config) = self.observability_config {
            if let Some(name) = self.service_name {
                config.service_name = name;
            }

            mopidy_core::init_observability(config.clone())
                .map_err(|e| Error::Internal(format!("Failed to initialize observability: {}", e)))?;

            Some(Arc::new(ClientMetrics::new(config.service_name.clone())))
        } else {
            None
        };

        let events = EventBus::new();
        for (event, handler) in self.handlers {
            events.add_handler(event, handler).await;
        }

        tracing::info!("Starting session");
        Ok(Session::start(self.url, self.reconnect_strategy, events, metrics))
    }
}
