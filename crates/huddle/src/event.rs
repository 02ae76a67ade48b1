//! What the coordinator tells the UI.

use huddle_games::GameEvent;
use huddle_protocol::GameKind;
use huddle_transport::{PeerId, PeerState};

/// A presentation event from a coordinator.
///
/// Delivered on the unbounded receiver returned by
/// [`PeerSessionCoordinator::new`](crate::PeerSessionCoordinator::new),
/// so the coordinator never waits on a slow UI.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The transport reported a link state change.
    PeerChanged { peer: PeerId, state: PeerState },

    /// The session host changed.
    HostChanged { host: PeerId },

    /// A game became active, started locally or received via `setGame`.
    GameStarted { kind: GameKind },

    /// Forwarded from the active game module.
    Game(GameEvent),

    /// A debounced batch of peers that left and didn't come back. Host only.
    PeersLost(Vec<PeerId>),

    /// Free-form text from a peer.
    Status { from: PeerId, message: String },

    /// Bytes from `from` couldn't be decoded and were dropped.
    DecodeFailed { from: PeerId, error: String },

    /// A well-formed command arrived that makes no sense right now.
    UnexpectedCommand { from: PeerId, command: &'static str },

    /// A send failed at the transport.
    TransportFailed { error: String },
}
