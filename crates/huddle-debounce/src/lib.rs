//! Batching debounce timer for Huddle.
//!
//! When a peer drops off the mesh, others often follow within a moment
//! (someone walked out of range with a friend, or a radio hiccup took
//! out several links). Reacting to each one separately would migrate the
//! host or rotate the turn several times in a row. A [`Debouncer`]
//! collects items for one window and hands them over as a single batch.
//!
//! # Semantics
//!
//! - The first [`push`](Debouncer::push) arms a one-shot deadline of
//!   `now + window`.
//! - Later pushes join the batch but do **not** extend the deadline.
//! - When the deadline passes, [`wait`](Debouncer::wait) returns the
//!   whole batch and the debouncer disarms. The next push starts a new
//!   window.
//!
//! # Integration
//!
//! A disarmed debouncer's `wait` pends forever, so it can sit in an
//! actor's `tokio::select!` loop unconditionally:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = commands.recv() => { /* handle commands */ }
//!         lost = debouncer.wait() => {
//!             handle_lost(lost);
//!         }
//!     }
//! }
//! ```
//!
//! `wait` is cancel-safe: if another branch wins, nothing is lost and
//! the deadline stays where it was.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::{self, Instant};
use tracing::{debug, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for a [`Debouncer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebounceConfig {
    /// How long to collect items after the first one arrives.
    pub window: Duration,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(2),
        }
    }
}

impl DebounceConfig {
    /// Longest window accepted by [`validated`](Self::validated).
    pub const MAX_WINDOW: Duration = Duration::from_secs(60);

    /// Creates a config with the given window.
    pub fn with_window(window: Duration) -> Self {
        Self { window }
    }

    /// Clamps the window to [`Self::MAX_WINDOW`].
    ///
    /// Called automatically by [`Debouncer::new`]. A zero window is
    /// allowed and fires on the next poll.
    pub fn validated(mut self) -> Self {
        if self.window > Self::MAX_WINDOW {
            warn!(
                window_ms = self.window.as_millis() as u64,
                max_ms = Self::MAX_WINDOW.as_millis() as u64,
                "debounce window exceeds maximum, clamping"
            );
            self.window = Self::MAX_WINDOW;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Debouncer
// ---------------------------------------------------------------------------

/// A one-shot, re-armable timer that collects a batch of items.
#[derive(Debug)]
pub struct Debouncer<T> {
    window: Duration,
    deadline: Option<Instant>,
    pending: Vec<T>,
}

impl<T: PartialEq> Debouncer<T> {
    /// Creates a disarmed debouncer.
    pub fn new(config: DebounceConfig) -> Self {
        let config = config.validated();
        debug!(window_ms = config.window.as_millis() as u64, "debouncer created");
        Self {
            window: config.window,
            deadline: None,
            pending: Vec::new(),
        }
    }

    /// Adds an item to the current batch, arming the timer if it isn't
    /// already armed.
    ///
    /// Returns `true` if this push armed the timer. An item equal to one
    /// already pending is not added twice.
    pub fn push(&mut self, item: T) -> bool {
        if !self.pending.contains(&item) {
            self.pending.push(item);
        }
        if self.deadline.is_some() {
            return false;
        }
        self.deadline = Some(Instant::now() + self.window);
        debug!(
            window_ms = self.window.as_millis() as u64,
            "debouncer armed"
        );
        true
    }

    /// Waits for the deadline and returns the collected batch.
    ///
    /// Pends forever while disarmed.
    pub async fn wait(&mut self) -> Vec<T> {
        let Some(deadline) = self.deadline else {
            return std::future::pending().await;
        };

        time::sleep_until(deadline).await;

        self.deadline = None;
        let batch = std::mem::take(&mut self.pending);
        debug!(batch = batch.len(), "debouncer fired");
        batch
    }

    /// Disarms the timer and returns whatever was pending.
    pub fn cancel(&mut self) -> Vec<T> {
        self.deadline = None;
        std::mem::take(&mut self.pending)
    }

    /// Whether a deadline is pending.
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Items collected so far in the current window.
    pub fn pending(&self) -> &[T] {
        &self.pending
    }

    /// When the current window closes, if armed.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// The configured window.
    pub fn window(&self) -> Duration {
        self.window
    }
}
