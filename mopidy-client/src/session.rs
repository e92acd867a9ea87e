//! Mopidy session over WebSocket
//!
//! A [`Session`] owns one logical connection to a Mopidy server. It keeps
//! that connection alive across drops, discovers the server's API through
//! `core.describe`, correlates responses with calls, and republishes server
//! events on its [`EventBus`].
//!
//! # Session Lifecycle
//!
//! 1. **Connect**: a background task opens the socket and emits `socket:connect`
//! 2. **Introspect**: `core.describe` is called and the reply turned into an [`Api`] tree
//! 3. **Ready**: the tree is published through [`Session::api`] and `state:online` is emitted
//! 4. **Drop**: on transport close, `socket:close` is emitted, pending calls fail
//!    with `ConnectionLost`, and the task reopens after the strategy's delay
//! 5. **Close**: [`Session::close`] ends everything; pending calls fail with `Closed`
//!
//! # Cloning
//!
//! `Session` is a cheap handle around an `Arc`; every clone talks to the same
//! socket, pending table and event bus. The background task keeps the session
//! alive until [`Session::close`] is called.
//!
//! # Examples
//!
//! ```rust,no_run
//! use mopidy_client::Session;
//! use serde_json::json;
//!
//! # async fn example() -> mopidy_core::Result<()> {
//! let session = Session::connect("ws://localhost:6680/mopidy/ws").await?;
//!
//! session.on("state:online", |_| println!("online")).await;
//! session.on("event:volumeChanged", |payload| println!("{}", payload["volume"])).await;
//!
//! // Raw call, usable as soon as the socket is open
//! let state = session.call("core.playback.get_state", None).await?;
//! println!("{state}");
//!
//! // Generated call, usable once the API is installed
//! if let Some(api) = session.api().await {
//!     if let Some(seek) = api.lookup("playback.seek").and_then(|n| n.call(vec![json!(30_000)])) {
//!         seek.await?;
//!     }
//! }
//!
//! session.close().await;
//! # Ok(())
//! # }
//! ```

use crate::api::{self, ApiNode, Invoker};
use crate::connection_state::{ConnectionManager, ConnectionState};
use crate::event_bus::{EventBus, EventHandler, SOCKET_CLOSE, SOCKET_CONNECT, SOCKET_ERROR, STATE_ONLINE};
use crate::metrics::ClientMetrics;
use crate::reconnect::ReconnectionStrategy;
use crate::request::PendingRequestTable;
use crate::session_builder::SessionBuilder;
use futures::future::BoxFuture;
use futures::stream::{SplitSink, SplitStream};
use futures::{FutureExt, SinkExt, StreamExt};
use mopidy_core::naming::local_event_name;
use mopidy_core::{codec, Error, JsonRpcRequest, Params, Result, ServerMessage, DESCRIBE_METHOD};
use serde_json::{json, Value};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};
use std::time::Instant;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, Notify, RwLock};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

/// What a generated API method returns
pub type ApiFuture = BoxFuture<'static, Result<Value>>;

/// Generated API tree of a session
pub type Api = ApiNode<ApiFuture>;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

/// How the read loop ended
enum ReadOutcome {
    Dropped,
    Shutdown,
}

pub(crate) struct SessionInner {
    connection: ConnectionManager,
    /// Write half; `None` whenever the transport is not open
    sender: Mutex<Option<WsSink>>,
    pending: PendingRequestTable,
    events: EventBus,
    api: RwLock<Option<Arc<Api>>>,
    shutdown: Notify,
    metrics: Option<Arc<ClientMetrics>>,
}

/// Handle to a reconnecting Mopidy session
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    /// Start a session with the default settings (5 s fixed reconnect delay)
    ///
    /// Returns as soon as the background task is running; the socket opens
    /// asynchronously. Listen for `socket:connect` or `state:online`, or poll
    /// [`state`](Self::state).
    pub async fn connect(url: impl Into<String>) -> Result<Self> {
        SessionBuilder::new(url).connect().await
    }

    pub(crate) fn start(
        url: String,
        strategy: Box<dyn ReconnectionStrategy>,
        events: EventBus,
        metrics: Option<Arc<ClientMetrics>>,
    ) -> Self {
        let inner = Arc::new(SessionInner::new(url, strategy, events, metrics));
        tokio::spawn(Arc::clone(&inner).run());
        Self { inner }
    }

    /// Send a request and wait for its outcome
    ///
    /// Fails immediately with [`Error::NotConnected`] if the socket is not
    /// open. `params`, when given, is sent as the keyword object.
    #[tracing::instrument(skip(self, params), fields(method = %method))]
    pub async fn call(&self, method: &str, params: Option<Params>) -> Result<Value> {
        self.inner.call(method, params).await
    }

    /// Shut the session down for good
    ///
    /// Closes the socket, fails every pending call with [`Error::Closed`] and
    /// stops reconnecting. Calling it again does nothing.
    pub async fn close(&self) {
        self.inner.close().await;
    }

    pub async fn state(&self) -> ConnectionState {
        self.inner.connection.state().await
    }

    /// Whether calls can currently be sent
    pub async fn is_connected(&self) -> bool {
        self.inner.sender.lock().await.is_some()
    }

    /// The API generated from the most recent successful introspection
    pub async fn api(&self) -> Option<Arc<Api>> {
        self.inner.api.read().await.clone()
    }

    pub fn url(&self) -> &str {
        self.inner.connection.url()
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    pub async fn on<F>(&self, event: impl Into<String>, handler: F) -> EventHandler
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.inner.events.on(event, handler).await
    }

    pub async fn add_handler(&self, event: impl Into<String>, handler: EventHandler) {
        self.inner.events.add_handler(event, handler).await;
    }

    pub async fn off(&self, event: Option<&str>, handler: Option<&EventHandler>) {
        self.inner.events.off(event, handler).await;
    }

    pub async fn pending_count(&self) -> usize {
        self.inner.pending.pending_count().await
    }
}

impl SessionInner {
    fn new(
        url: String,
        strategy: Box<dyn ReconnectionStrategy>,
        events: EventBus,
        metrics: Option<Arc<ClientMetrics>>,
    ) -> Self {
        Self {
            connection: ConnectionManager::new(url, strategy),
            sender: Mutex::new(None),
            pending: PendingRequestTable::new(),
            events,
            api: RwLock::new(None),
            shutdown: Notify::new(),
            metrics,
        }
    }

    fn observe_state(&self, state: ConnectionState) {
        if let Some(ref m) = self.metrics {
            m.update_connection_state(state);
        }
    }

    fn record_error(&self, kind: &str) {
        if let Some(ref m) = self.metrics {
            m.record_error(kind);
        }
    }

    /// Emit on the bus from the connection task
    ///
    /// A panicking handler ends this emission only; the remaining handlers for
    /// it are skipped and the socket keeps being read.
    async fn emit(&self, event: &str, payload: &Value) {
        let emitted = AssertUnwindSafe(self.events.emit(event, payload))
            .catch_unwind()
            .await;
        if let Err(panic) = emitted {
            tracing::error!(
                event = %event,
                panic = %panic_message(panic.as_ref()),
                "Event handler panicked"
            );
            self.record_error("handler_panic");
        }
    }

    async fn call(&self, method: &str, params: Option<Params>) -> Result<Value> {
        let start = Instant::now();

        let rx = {
            // Registration happens under the sender lock so close() and
            // connection loss cannot miss a request that is being sent.
            let mut sender = self.sender.lock().await;
            let Some(sink) = sender.as_mut() else {
                return Err(Error::NotConnected);
            };

            let id = self.pending.next_id().await;
            let request = JsonRpcRequest::new(method, params, id);
            let text = codec::encode_request(&request)?;
            let rx = self.pending.register(id).await;

            if let Err(e) = sink.send(Message::Text(text)).await {
                self.pending.remove(id).await;
                self.record_error("send");
                tracing::warn!(id, error = %e, "Failed to send request");
                return Err(Error::WebSocket(e.to_string()));
            }
            tracing::debug!(id, "Request sent, waiting for response");
            rx
        };

        let outcome = rx
            .await
            .map_err(|_| Error::Internal("Response channel closed".to_string()))?;

        if let Some(ref m) = self.metrics {
            let status = if outcome.is_ok() { "success" } else { "error" };
            m.record_request(method, status, start.elapsed().as_secs_f64());
        }
        if let Err(Error::JsonRpc(ref err)) = outcome {
            tracing::debug!(method = %method, error = %err, "Server returned an error");
        }
        outcome
    }

    async fn close(&self) {
        if !self.connection.close().await {
            return;
        }
        tracing::info!(url = %self.connection.url(), "Closing session");
        self.observe_state(ConnectionState::Closed);
        self.shutdown.notify_one();

        let sink = self.sender.lock().await.take();
        if let Some(mut sink) = sink {
            if let Err(e) = sink.close().await {
                tracing::debug!(error = %e, "Error while closing socket");
            }
        }
        self.pending.reject_all(Error::Closed).await;
    }

    /// Connection task: open, read until the transport drops, wait, repeat
    async fn run(self: Arc<Self>) {
        let url = self.connection.url().to_string();
        let mut opened_before = false;

        loop {
            if !self.connection.connecting().await {
                break;
            }
            self.observe_state(ConnectionState::Connecting);
            tracing::info!(url = %url, "Connecting to server");

            match connect_async(url.as_str()).await {
                Ok((ws_stream, _)) => {
                    let (sink, stream) = ws_stream.split();
                    let Some(generation) = self.install_sender(sink).await else {
                        break;
                    };
                    self.observe_state(ConnectionState::Open);
                    if opened_before {
                        tracing::info!("Reconnected successfully");
                        if let Some(ref m) = self.metrics {
                            m.record_reconnection_success();
                        }
                    } else {
                        tracing::info!("Connected successfully");
                    }
                    opened_before = true;

                    self.emit(SOCKET_CONNECT, &Value::Null).await;
                    tokio::spawn(Arc::clone(&self).introspect(generation));

                    if let ReadOutcome::Shutdown = self.read_frames(stream).await {
                        break;
                    }
                    self.connection_dropped().await;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to open connection");
                    self.record_error("connect");
                    self.connection.open_failed();
                    self.emit(SOCKET_ERROR, &json!({ "message": e.to_string() }))
                        .await;
                    if !self.connection.disconnected().await {
                        break;
                    }
                    self.observe_state(ConnectionState::Disconnected);
                    self.emit(SOCKET_CLOSE, &Value::Null).await;
                }
            }

            let Some(delay) = self.connection.next_reconnect_delay().await else {
                tracing::info!("Reconnection abandoned");
                self.observe_state(ConnectionState::Closed);
                self.pending.reject_all(Error::ConnectionLost).await;
                break;
            };

            tracing::info!(
                delay_secs = delay.as_secs_f64(),
                attempt = self.connection.failed_attempts(),
                "Reconnecting"
            );
            if let Some(ref m) = self.metrics {
                m.record_reconnection_attempt();
            }

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.shutdown.notified() => break,
            }
        }

        tracing::debug!("Connection task finished");
    }

    /// Publish the write half, unless the session was closed meanwhile
    ///
    /// Returns the generation of the new connection.
    async fn install_sender(&self, mut sink: WsSink) -> Option<u64> {
        let mut sender = self.sender.lock().await;
        let Some(generation) = self.connection.opened().await else {
            drop(sender);
            let _ = sink.close().await;
            return None;
        };
        *sender = Some(sink);
        Some(generation)
    }

    async fn read_frames(&self, mut stream: SplitStream<WsStream>) -> ReadOutcome {
        loop {
            tokio::select! {
                _ = self.shutdown.notified() => return ReadOutcome::Shutdown,
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => self.dispatch(&text).await,
                    Some(Ok(Message::Close(frame))) => {
                        tracing::info!(?frame, "Connection closed by server");
                        return ReadOutcome::Dropped;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!(error = %e, "WebSocket error");
                        self.record_error("websocket");
                        self.emit(SOCKET_ERROR, &json!({ "message": e.to_string() }))
                            .await;
                        return ReadOutcome::Dropped;
                    }
                    None => {
                        tracing::info!("Connection stream ended");
                        return ReadOutcome::Dropped;
                    }
                },
            }
        }
    }

    async fn connection_dropped(&self) {
        self.sender.lock().await.take();
        if self.connection.disconnected().await {
            self.observe_state(ConnectionState::Disconnected);
        }
        self.pending.reject_all(Error::ConnectionLost).await;
        self.emit(SOCKET_CLOSE, &Value::Null).await;
    }

    /// Route one inbound text frame
    pub(crate) async fn dispatch(&self, text: &str) {
        let message = match codec::decode(text) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(error = %e, "Dropping malformed frame");
                self.record_error("parse");
                return;
            }
        };

        match message {
            ServerMessage::Response(response) => match response.request_id() {
                Some(id) => {
                    self.pending.resolve(id, response.into_result()).await;
                }
                None => {
                    tracing::warn!(id = %response.id, "Response with unusable id");
                }
            },
            ServerMessage::Event(event) => {
                let name = local_event_name(&event.name);
                tracing::debug!(event = %name, "Event received");
                if let Some(ref m) = self.metrics {
                    m.record_event(&name);
                }
                self.emit(&name, &Value::Object(event.payload)).await;
            }
            ServerMessage::Unrecognized(value) => {
                tracing::warn!(message = %value, "Unrecognized message");
            }
        }
    }

    /// Fetch the catalog and publish a fresh API tree
    ///
    /// Every step is tied to `generation`; once a newer socket has opened,
    /// this run stops touching the state and the published API.
    async fn introspect(self: Arc<Self>, generation: u64) {
        if !self.connection.introspecting(generation).await {
            return;
        }
        self.observe_state(ConnectionState::Introspecting);

        let catalog = self
            .call(DESCRIBE_METHOD, None)
            .await
            .and_then(codec::decode_catalog);

        match catalog {
            Ok(catalog) => {
                let api = Arc::new(api::build(&catalog, self.invoker()));
                let methods = api.leaf_count();

                let mut published = self.api.write().await;
                if !self.connection.ready(generation).await {
                    tracing::debug!(generation, "Discarding API of a superseded connection");
                    return;
                }
                *published = Some(api);
                drop(published);

                self.observe_state(ConnectionState::Ready);
                if let Some(ref m) = self.metrics {
                    m.record_api_installed(methods);
                }
                tracing::info!(methods, "API installed");
                self.emit(STATE_ONLINE, &Value::Null).await;
            }
            Err(e) => {
                tracing::error!(error = %e, generation, "Introspection failed");
                self.record_error("introspection");
                if self.connection.introspection_failed(generation).await {
                    self.observe_state(ConnectionState::Open);
                }
            }
        }
    }

    /// Invoker for generated methods; holds the session weakly
    fn invoker(self: &Arc<Self>) -> Invoker<ApiFuture> {
        let session: Weak<SessionInner> = Arc::downgrade(self);
        Arc::new(move |method: &str, params: Option<Params>| -> ApiFuture {
            let session = session.clone();
            let method = method.to_string();
            Box::pin(async move {
                match session.upgrade() {
                    Some(inner) => inner.call(&method, params).await,
                    None => Err(Error::Closed),
                }
            })
        })
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconnect::FixedDelay;
    use mopidy_core::JsonRpcErrorData;
    use std::sync::Mutex as StdMutex;

    fn offline_session() -> Arc<SessionInner> {
        Arc::new(SessionInner::new(
            "ws://127.0.0.1:1/mopidy/ws".to_string(),
            Box::new(FixedDelay::default()),
            EventBus::new(),
            None,
        ))
    }

    #[tokio::test]
    async fn test_response_resolves_pending() {
        let inner = offline_session();
        let rx = inner.pending.register(7).await;

        inner
            .dispatch(r#"{"jsonrpc":"2.0","id":7,"result":"playing"}"#)
            .await;

        assert_eq!(rx.await.unwrap().unwrap(), json!("playing"));
        assert_eq!(inner.pending.pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_error_response_surfaces_as_json_rpc_error() {
        let inner = offline_session();
        let rx = inner.pending.register(2).await;

        inner
            .dispatch(r#"{"jsonrpc":"2.0","id":2,"error":{"code":-32601,"message":"Method not found"}}"#)
            .await;

        match rx.await.unwrap() {
            Err(Error::JsonRpc(err)) => {
                assert_eq!(err, JsonRpcErrorData::new(-32601, "Method not found"));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_event_is_renamed_and_stripped() {
        let inner = offline_session();
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        inner
            .events
            .on("event:volumeChanged", move |payload| {
                seen_clone.lock().unwrap().push(payload.clone());
            })
            .await;

        inner
            .dispatch(r#"{"event":"volume_changed","volume":42}"#)
            .await;

        assert_eq!(*seen.lock().unwrap(), vec![json!({"volume": 42})]);
    }

    #[tokio::test]
    async fn test_event_without_payload_gets_empty_object() {
        let inner = offline_session();
        let seen = Arc::new(StdMutex::new(None));
        let seen_clone = Arc::clone(&seen);
        inner
            .events
            .on("event:trackPlaybackStarted", move |payload| {
                *seen_clone.lock().unwrap() = Some(payload.clone());
            })
            .await;

        inner.dispatch(r#"{"event":"track_playback_started"}"#).await;

        assert_eq!(*seen.lock().unwrap(), Some(json!({})));
    }

    #[tokio::test]
    async fn test_panicking_handler_does_not_stop_dispatch() {
        let inner = offline_session();
        inner
            .events
            .on("event:volumeChanged", |_| panic!("handler bug"))
            .await;
        let rx = inner.pending.register(4).await;

        inner
            .dispatch(r#"{"event":"volume_changed","volume":10}"#)
            .await;
        inner
            .dispatch(r#"{"jsonrpc":"2.0","id":4,"result":"3.69.1"}"#)
            .await;

        assert_eq!(rx.await.unwrap().unwrap(), json!("3.69.1"));
    }

    #[test]
    fn test_panic_message() {
        let from_str: Box<dyn Any + Send> = Box::new("static");
        let from_string: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let other: Box<dyn Any + Send> = Box::new(5_u8);

        assert_eq!(panic_message(from_str.as_ref()), "static");
        assert_eq!(panic_message(from_string.as_ref()), "owned");
        assert_eq!(panic_message(other.as_ref()), "non-string panic payload");
    }

    #[tokio::test]
    async fn test_garbage_frames_are_dropped() {
        let inner = offline_session();
        let rx = inner.pending.register(0).await;

        inner.dispatch("not json at all").await;
        inner.dispatch(r#"{"jsonrpc":"2.0","something":"else"}"#).await;
        inner.dispatch(r#"[1,2,3]"#).await;
        inner.dispatch(r#"{"jsonrpc":"2.0","id":"abc","result":1}"#).await;

        assert_eq!(inner.pending.pending_count().await, 1);
        drop(rx);
    }

    #[tokio::test]
    async fn test_late_response_is_ignored() {
        let inner = offline_session();
        inner
            .dispatch(r#"{"jsonrpc":"2.0","id":99,"result":null}"#)
            .await;
        assert_eq!(inner.pending.pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_call_without_socket_is_not_connected() {
        let session = Session {
            inner: offline_session(),
        };
        let err = session.call("core.playback.play", None).await.unwrap_err();
        assert!(matches!(err, Error::NotConnected));
        assert_eq!(err.to_string(), "Socket is not connected");
        assert!(!session.is_connected().await);
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_rejects_pending() {
        let session = Session {
            inner: offline_session(),
        };
        let rx = session.inner.pending.register(0).await;

        session.close().await;
        session.close().await;

        assert_eq!(session.state().await, ConnectionState::Closed);
        let err = rx.await.unwrap().unwrap_err();
        assert_eq!(err.to_string(), "Socket has been closed");
    }

    #[tokio::test]
    async fn test_invoker_after_session_gone() {
        let inner = offline_session();
        let invoke = inner.invoker();
        drop(inner);

        let err = invoke("core.playback.play", None).await.unwrap_err();
        assert!(matches!(err, Error::Closed));
    }

    #[tokio::test]
    async fn test_invoker_goes_through_call() {
        let inner = offline_session();
        let invoke = inner.invoker();

        let err = invoke("core.playback.play", None).await.unwrap_err();
        assert!(matches!(err, Error::NotConnected));
    }
}
