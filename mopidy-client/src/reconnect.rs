//! Reconnection strategies
//!
//! When the socket drops, the session asks its strategy how long to wait
//! before opening a fresh one, or whether to give up.
//!
//! # Built-in Strategies
//!
//! - **FixedDelay**: the same delay before every attempt (default, 5 seconds)
//! - **NoReconnect**: give up on the first drop
//!
//! There is deliberately no growing backoff: a media server on the local
//! network is either back within seconds or not coming back soon, and a fixed
//! cadence keeps the remote's reconnect latency predictable.
//!
//! # Examples
//!
//! ```rust
//! use mopidy_client::{FixedDelay, ReconnectionStrategy};
//! use std::time::Duration;
//!
//! let mut strategy = FixedDelay::new(Duration::from_secs(2)).with_max_attempts(3);
//! assert_eq!(strategy.next_delay(0), Some(Duration::from_secs(2)));
//! assert_eq!(strategy.next_delay(3), None);
//! ```

use std::time::Duration;

/// Delay used when nothing else is configured
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(5000);

/// Decides when (and whether) to reconnect after the socket drops
///
/// `attempt` counts consecutive failed opens since the last successful one,
/// starting at 0. `reset()` is called after every successful open.
pub trait ReconnectionStrategy: Send + Sync {
    /// `Some(delay)` to wait and retry, `None` to give up
    fn next_delay(&mut self, attempt: u32) -> Option<Duration>;

    fn reset(&mut self);
}

/// Constant delay between attempts, optionally bounded
#[derive(Debug, Clone)]
pub struct FixedDelay {
    delay: Duration,
    max_attempts: Option<u32>,
}

impl FixedDelay {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            max_attempts: None,
        }
    }

    /// Give up after `max_attempts` consecutive failures
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Default for FixedDelay {
    fn default() -> Self {
        Self::new(DEFAULT_RECONNECT_DELAY)
    }
}

impl ReconnectionStrategy for FixedDelay {
    fn next_delay(&mut self, attempt: u32) -> Option<Duration> {
        if let Some(max) = self.max_attempts {
            if attempt >= max {
                return None;
            }
        }
        Some(self.delay)
    }

    fn reset(&mut self) {}
}

/// Never reconnect
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReconnect;

impl ReconnectionStrategy for NoReconnect {
    fn next_delay(&mut self, _attempt: u32) -> Option<Duration> {
        None
    }

    fn reset(&mut self) {}
}
