//! The set of peers in a session.

use std::collections::BTreeSet;

use huddle_transport::PeerId;

use crate::TurnOrder;

/// The currently connected peers plus the local device.
///
/// The local id is always a member. Inserting or removing it is a no-op,
/// so a stray transport event about ourselves can't empty the roster.
#[derive(Debug, Clone)]
pub struct PeerRoster {
    local: PeerId,
    connected: BTreeSet<PeerId>,
}

impl PeerRoster {
    /// Creates a roster holding only `local`.
    pub fn new(local: PeerId) -> Self {
        Self {
            local,
            connected: BTreeSet::new(),
        }
    }

    /// This device's id.
    pub fn local(&self) -> PeerId {
        self.local
    }

    /// Adds a connected peer. Returns `true` if it wasn't already present.
    pub fn insert(&mut self, peer: PeerId) -> bool {
        peer != self.local && self.connected.insert(peer)
    }

    /// Removes a peer. Returns `true` if it was present.
    pub fn remove(&mut self, peer: PeerId) -> bool {
        peer != self.local && self.connected.remove(&peer)
    }

    /// Whether `peer` is the local device or a connected peer.
    pub fn contains(&self, peer: PeerId) -> bool {
        peer == self.local || self.connected.contains(&peer)
    }

    /// Connected remote peers, ascending. Never includes the local id.
    pub fn connected_peers(&self) -> Vec<PeerId> {
        self.connected.iter().copied().collect()
    }

    /// Number of members, counting the local device.
    pub fn len(&self) -> usize {
        self.connected.len() + 1
    }

    /// Whether no remote peer is connected.
    pub fn is_alone(&self) -> bool {
        self.connected.is_empty()
    }

    /// Computes the turn order for the current membership.
    ///
    /// Turn order is never cached; call this again after any change.
    pub fn turn_order(&self) -> TurnOrder {
        TurnOrder::new(self.local, self.connected.iter().copied())
    }
}
