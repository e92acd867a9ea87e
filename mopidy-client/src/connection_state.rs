//! Connection state management
//!
//! Tracks where a session is in its lifecycle and asks the reconnection
//! strategy what to do when the socket goes away.
//!
//! # Connection States
//!
//! - **Disconnected**: no socket; a reconnect may be scheduled
//! - **Connecting**: opening the WebSocket
//! - **Open**: socket is up, raw calls work
//! - **Introspecting**: `core.describe` is in flight
//! - **Ready**: the generated API is installed
//! - **Closed**: shut down for good, nothing will reconnect
//!
//! # State Transitions
//!
//! ```text
//! Disconnected → Connecting → Open → Introspecting → Ready
//!      ↑             │          │          │           │
//!      └─────────────┴──────────┴──────────┴───────────┘   (transport close)
//!
//! any state → Closed   (close() or strategy gave up)
//! ```
//!
//! `Closed` is absorbing: once entered, every later transition is refused, so
//! a connection task that is still finishing up cannot resurrect the session.
//!
//! Every successful open starts a new *generation*. Introspection steps carry
//! the generation they were started for and are refused once a newer socket
//! has opened.

use crate::reconnect::ReconnectionStrategy;
use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    Introspecting,
    Ready,
    Closed,
}

impl ConnectionState {
    /// Numeric encoding used by the connection state gauge
    pub fn as_metric_value(self) -> i64 {
        match self {
            Self::Disconnected => 0,
            Self::Connecting => 1,
            Self::Open => 2,
            Self::Introspecting => 3,
            Self::Ready => 4,
            Self::Closed => 5,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Introspecting => "introspecting",
            Self::Ready => "ready",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Owns the state and the reconnection strategy of one session
pub struct ConnectionManager {
    state: Arc<RwLock<ConnectionState>>,
    strategy: Arc<RwLock<Box<dyn ReconnectionStrategy>>>,
    failed_attempts: AtomicU32,
    generation: AtomicU64,
    url: String,
}

impl ConnectionManager {
    pub fn new(url: impl Into<String>, strategy: Box<dyn ReconnectionStrategy>) -> Self {
        Self {
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            strategy: Arc::new(RwLock::new(strategy)),
            failed_attempts: AtomicU32::new(0),
            generation: AtomicU64::new(0),
            url: url.into(),
        }
    }

    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Move to `new_state` unless the session is already closed
    ///
    /// Returns whether the transition happened.
    pub async fn transition(&self, new_state: ConnectionState) -> bool {
        let mut state = self.state.write().await;
        if *state == ConnectionState::Closed {
            return new_state == ConnectionState::Closed;
        }
        if *state != new_state {
            tracing::debug!(from = %*state, to = %new_state, "Connection state change");
        }
        *state = new_state;
        true
    }

    /// Move from `expected` to `new_state`, but only while `generation` is current
    async fn advance(
        &self,
        generation: u64,
        expected: ConnectionState,
        new_state: ConnectionState,
    ) -> bool {
        let mut state = self.state.write().await;
        if *state != expected || self.generation.load(Ordering::SeqCst) != generation {
            return false;
        }
        tracing::debug!(from = %*state, to = %new_state, generation, "Connection state change");
        *state = new_state;
        true
    }

    pub async fn connecting(&self) -> bool {
        self.transition(ConnectionState::Connecting).await
    }

    /// The socket opened; the failure streak and the strategy start over
    ///
    /// Returns the generation of the new connection, or `None` if the session
    /// was closed meanwhile.
    pub async fn opened(&self) -> Option<u64> {
        let generation = {
            let mut state = self.state.write().await;
            if *state == ConnectionState::Closed {
                return None;
            }
            tracing::debug!(from = %*state, to = %ConnectionState::Open, "Connection state change");
            *state = ConnectionState::Open;
            self.generation.fetch_add(1, Ordering::SeqCst) + 1
        };
        self.failed_attempts.store(0, Ordering::SeqCst);
        self.strategy.write().await.reset();
        Some(generation)
    }

    /// Open → Introspecting for the given connection
    pub async fn introspecting(&self, generation: u64) -> bool {
        self.advance(generation, ConnectionState::Open, ConnectionState::Introspecting)
            .await
    }

    /// Introspecting → Ready for the given connection
    pub async fn ready(&self, generation: u64) -> bool {
        self.advance(generation, ConnectionState::Introspecting, ConnectionState::Ready)
            .await
    }

    /// Introspecting → Open for the given connection; raw calls keep working
    pub async fn introspection_failed(&self, generation: u64) -> bool {
        self.advance(generation, ConnectionState::Introspecting, ConnectionState::Open)
            .await
    }

    pub async fn disconnected(&self) -> bool {
        self.transition(ConnectionState::Disconnected).await
    }

    /// Enter the terminal state; returns `false` if it was already closed
    pub async fn close(&self) -> bool {
        let mut state = self.state.write().await;
        if *state == ConnectionState::Closed {
            return false;
        }
        *state = ConnectionState::Closed;
        true
    }

    /// Record a failed open attempt
    pub fn open_failed(&self) {
        self.failed_attempts.fetch_add(1, Ordering::SeqCst);
    }

    /// Consecutive failed opens since the last successful one
    pub fn failed_attempts(&self) -> u32 {
        self.failed_attempts.load(Ordering::SeqCst)
    }

    /// How long to wait before the next open
    ///
    /// Returns `None` if the strategy gives up, in which case the session is
    /// moved to `Closed`.
    pub async fn next_reconnect_delay(&self) -> Option<Duration> {
        let attempt = self.failed_attempts();
        let delay = self.strategy.write().await.next_delay(attempt);
        if delay.is_none() {
            self.close().await;
        }
        delay
    }
}
