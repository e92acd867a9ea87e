//! Request tracking
//!
//! Correlates outgoing requests with the responses that eventually arrive on
//! the socket, in whatever order the server sends them.
//!
//! # Request Lifecycle
//!
//! 1. **Generate ID**: `next_id()` hands out 0, 1, 2, ... for the session's lifetime
//! 2. **Register**: a oneshot channel is stored under the id
//! 3. **Send**: the session writes the envelope to the socket
//! 4. **Resolve**: the matching response completes the channel and removes the entry
//! 5. **Or reject**: a dropped connection or explicit close fails every entry at once
//!
//! Late, duplicate, or unknown ids are ignored, so a response for a request
//! that was already rejected is harmless.

use mopidy_core::{Error, RequestId, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};

/// Receiving half handed to the caller of a request
pub type PendingResponse = oneshot::Receiver<Result<Value>>;

/// Outstanding requests keyed by correlation id
#[derive(Clone, Default)]
pub struct PendingRequestTable {
    pending: Arc<Mutex<HashMap<RequestId, oneshot::Sender<Result<Value>>>>>,
    counter: Arc<Mutex<RequestId>>,
}

impl PendingRequestTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next correlation id
    pub async fn next_id(&self) -> RequestId {
        let mut counter = self.counter.lock().await;
        let id = *counter;
        *counter += 1;
        id
    }

    /// Start waiting for the response to `id`
    pub async fn register(&self, id: RequestId) -> PendingResponse {
        let (tx, rx) = oneshot::channel();
        if self.pending.lock().await.insert(id, tx).is_some() {
            tracing::warn!(id, "Replaced a pending request with the same id");
        }
        rx
    }

    /// Deliver the outcome for `id`; unknown ids are ignored
    ///
    /// Returns whether a pending entry was found.
    pub async fn resolve(&self, id: RequestId, outcome: Result<Value>) -> bool {
        match self.pending.lock().await.remove(&id) {
            Some(tx) => {
                // The caller may have stopped waiting; that is not our problem.
                let _ = tx.send(outcome);
                true
            }
            None => {
                tracing::debug!(id, "Response for unknown request id");
                false
            }
        }
    }

    /// Forget `id` without notifying anyone (used when the send itself failed)
    pub async fn remove(&self, id: RequestId) {
        self.pending.lock().await.remove(&id);
    }

    /// Fail every pending request with `error` and empty the table
    pub async fn reject_all(&self, error: Error) -> usize {
        let mut pending = self.pending.lock().await;
        let count = pending.len();
        for (_, tx) in pending.drain() {
            let _ = tx.send(Err(error.clone()));
        }
        if count > 0 {
            tracing::debug!(count, error = %error, "Rejected pending requests");
        }
        count
    }

    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }
}
