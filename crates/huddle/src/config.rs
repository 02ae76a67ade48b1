//! Coordinator configuration.

use std::fmt;
use std::time::Duration;

use huddle_debounce::DebounceConfig;
use serde::{Deserialize, Serialize};
use tracing::warn;

// ---------------------------------------------------------------------------
// SessionRole
// ---------------------------------------------------------------------------

/// How a device enters a session.
///
/// - **Advertiser**: waits to be found and stays the host until someone
///   else is announced.
/// - **Inviter**: browses for an existing session. The first peer it
///   links with becomes its host, and it stops advertising.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionRole {
    #[default]
    Advertiser,
    Inviter,
}

impl fmt::Display for SessionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Advertiser => write!(f, "advertiser"),
            Self::Inviter => write!(f, "inviter"),
        }
    }
}

// ---------------------------------------------------------------------------
// CoordinatorConfig
// ---------------------------------------------------------------------------

/// Configuration for a [`PeerSessionCoordinator`](crate::PeerSessionCoordinator).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Whether this device advertises or invites.
    pub role: SessionRole,

    /// How long the host collects disconnects before reacting to them
    /// as one batch.
    pub disconnect_debounce: Duration,

    /// Capacity of the command channel behind a
    /// [`CoordinatorHandle`](crate::CoordinatorHandle).
    pub command_buffer: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            role: SessionRole::Advertiser,
            disconnect_debounce: Duration::from_secs(2),
            command_buffer: 64,
        }
    }
}

impl CoordinatorConfig {
    /// Default config with the given role.
    pub fn with_role(role: SessionRole) -> Self {
        Self {
            role,
            ..Self::default()
        }
    }

    /// Clamps values into their usable ranges.
    ///
    /// - `disconnect_debounce` is capped at [`DebounceConfig::MAX_WINDOW`].
    /// - `command_buffer` is at least 1.
    pub fn validated(mut self) -> Self {
        if self.disconnect_debounce > DebounceConfig::MAX_WINDOW {
            warn!(
                debounce_ms = self.disconnect_debounce.as_millis() as u64,
                max_ms = DebounceConfig::MAX_WINDOW.as_millis() as u64,
                "disconnect debounce exceeds maximum, clamping"
            );
            self.disconnect_debounce = DebounceConfig::MAX_WINDOW;
        }
        if self.command_buffer == 0 {
            warn!("command_buffer of 0 is not allowed, using 1");
            self.command_buffer = 1;
        }
        self
    }

    /// The debouncer config for the disconnect window.
    pub fn debounce(&self) -> DebounceConfig {
        DebounceConfig::with_window(self.disconnect_debounce)
    }
}
