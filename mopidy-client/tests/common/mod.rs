//! Common test utilities for mopidy-client integration tests
//!
//! A small in-process stand-in for a Mopidy server: it answers
//! `core.describe` from a canned catalog, hands every other request to a
//! test-supplied handler, and can push events or drop all connections on
//! demand.

#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use mopidy_client::{ConnectionState, Session};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

pub const TIMEOUT: Duration = Duration::from_secs(5);

/// Produces the reply frame for a request, or `None` to stay silent
pub type Handler = Arc<dyn Fn(&Value) -> Option<String> + Send + Sync>;

#[derive(Clone, Debug)]
enum Command {
    Push(String),
    Drop,
}

pub struct MockMopidy {
    addr: SocketAddr,
    commands: broadcast::Sender<Command>,
    requests: mpsc::UnboundedReceiver<Value>,
    connections: Arc<AtomicUsize>,
    shutdown_tx: mpsc::Sender<()>,
}

impl MockMopidy {
    /// Standard catalog, every other call echoed back as its result
    pub async fn start() -> Self {
        Self::spawn(Some(default_catalog()), Arc::new(echo), 0).await
    }

    pub async fn with_handler(handler: Handler) -> Self {
        Self::spawn(Some(default_catalog()), handler, 0).await
    }

    /// `catalog: None` hands `core.describe` to the handler as well
    pub async fn spawn(catalog: Option<Value>, handler: Handler, refuse_first: usize) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let (requests_tx, requests) = mpsc::unbounded_channel();
        let (commands, _) = broadcast::channel(64);
        let connections = Arc::new(AtomicUsize::new(0));

        let commands_clone = commands.clone();
        let connections_clone = Arc::clone(&connections);
        tokio::spawn(async move {
            let mut refused = 0;
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    accepted = listener.accept() => {
                        let Ok((stream, _)) = accepted else { continue };
                        if refused < refuse_first {
                            // Hang up before the handshake
                            refused += 1;
                            drop(stream);
                            continue;
                        }
                        connections_clone.fetch_add(1, Ordering::SeqCst);
                        tokio::spawn(serve(
                            stream,
                            catalog.clone(),
                            Arc::clone(&handler),
                            requests_tx.clone(),
                            commands_clone.subscribe(),
                        ));
                    }
                }
            }
            let _ = commands_clone.send(Command::Drop);
        });

        Self {
            addr,
            commands,
            requests,
            connections,
            shutdown_tx,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}/mopidy/ws", self.addr)
    }

    /// Connections that completed (or attempted) the handshake so far
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Send a raw frame to every live connection
    pub fn push(&self, frame: impl Into<String>) {
        let _ = self.commands.send(Command::Push(frame.into()));
    }

    pub fn push_event(&self, name: &str, payload: Value) {
        self.push(mock_event(name, payload));
    }

    /// Abruptly drop every live connection; the listener keeps accepting
    pub fn drop_connections(&self) {
        let _ = self.commands.send(Command::Drop);
    }

    /// Next request received by the server, in arrival order
    pub async fn next_request(&mut self) -> Option<Value> {
        tokio::time::timeout(TIMEOUT, self.requests.recv())
            .await
            .ok()
            .flatten()
    }

    /// Next request for `method`, skipping others
    pub async fn next_request_for(&mut self, method: &str) -> Option<Value> {
        loop {
            let request = self.next_request().await?;
            if request["method"] == method {
                return Some(request);
            }
        }
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

async fn serve(
    stream: tokio::net::TcpStream,
    catalog: Option<Value>,
    handler: Handler,
    requests: mpsc::UnboundedSender<Value>,
    mut commands: broadcast::Receiver<Command>,
) {
    let Ok(ws_stream) = accept_async(stream).await else {
        return;
    };
    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let Ok(request) = serde_json::from_str::<Value>(&text) else { continue };
                    let _ = requests.send(request.clone());

                    let reply = match (&catalog, request["method"].as_str()) {
                        (Some(catalog), Some("core.describe")) => {
                            Some(mock_response(&request["id"], catalog.clone()))
                        }
                        _ => handler(&request),
                    };
                    if let Some(reply) = reply {
                        if write.send(Message::Text(reply)).await.is_err() {
                            break;
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            command = commands.recv() => match command {
                Ok(Command::Push(frame)) => {
                    let _ = write.send(Message::Text(frame)).await;
                }
                Ok(Command::Drop) | Err(broadcast::error::RecvError::Closed) => break,
                Err(broadcast::error::RecvError::Lagged(_)) => {}
            },
        }
    }
}

/// A trimmed-down `core.describe` result
pub fn default_catalog() -> Value {
    json!({
        "core.get_version": {"description": "Get version of the Mopidy core API", "params": []},
        "core.playback.play": {
            "description": "Play the given track",
            "params": [{"name": "tl_track", "default": null}, {"name": "tlid", "default": null}]
        },
        "core.playback.seek": {"params": [{"name": "time_position"}]},
        "core.playback.get_state": {"params": []},
        "core.tracklist.get_tl_tracks": {"params": []},
        "core.library.search": {
            "params": [{"name": "query", "default": null}, {"name": "uris", "default": null}, {"kwargs": true}]
        },
        "core.mixer.set_volume": {"params": [{"name": "volume"}]}
    })
}

/// Replies with `{"method": .., "params": ..}` so tests can see what was sent
pub fn echo(request: &Value) -> Option<String> {
    Some(mock_response(
        &request["id"],
        json!({"method": request["method"], "params": request.get("params")}),
    ))
}

pub fn mock_response(id: &Value, result: Value) -> String {
    json!({"jsonrpc": "2.0", "id": id, "result": result}).to_string()
}

pub fn mock_error_response(id: &Value, code: i32, message: &str) -> String {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {"code": code, "message": message}
    })
    .to_string()
}

/// Server event frame; payload members are merged next to `event`
pub fn mock_event(name: &str, payload: Value) -> String {
    let mut frame = json!({"jsonrpc": "2.0", "event": name});
    if let (Some(frame), Value::Object(payload)) = (frame.as_object_mut(), payload) {
        frame.extend(payload);
    }
    frame.to_string()
}

/// Records `(event, payload)` pairs from session handlers
pub struct EventLog {
    tx: mpsc::UnboundedSender<(String, Value)>,
    rx: mpsc::UnboundedReceiver<(String, Value)>,
}

impl EventLog {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }

    /// Handler that logs every emission of `event`
    pub fn handler(&self, event: &str) -> impl Fn(&Value) + Send + Sync + 'static {
        let tx = self.tx.clone();
        let event = event.to_string();
        move |payload: &Value| {
            let _ = tx.send((event.clone(), payload.clone()));
        }
    }

    pub async fn next(&mut self) -> Option<(String, Value)> {
        tokio::time::timeout(TIMEOUT, self.rx.recv())
            .await
            .ok()
            .flatten()
    }

    /// Skip ahead to the next emission of `event`
    pub async fn wait_for(&mut self, event: &str) -> Option<Value> {
        loop {
            let (name, payload) = self.next().await?;
            if name == event {
                return Some(payload);
            }
        }
    }

    /// Everything logged so far, without waiting
    pub fn drain(&mut self) -> Vec<(String, Value)> {
        let mut seen = Vec::new();
        while let Ok(entry) = self.rx.try_recv() {
            seen.push(entry);
        }
        seen
    }
}

/// Poll until the session reaches `state`
pub async fn wait_for_state(session: &Session, state: ConnectionState) -> bool {
    tokio::time::timeout(TIMEOUT, async {
        while session.state().await != state {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .is_ok()
}

pub fn params(value: Value) -> Option<serde_json::Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}
