//! Deterministic turn order over a peer set.
//!
//! Peers discover each other in whatever order the radio delivers, so
//! no two devices agree on "the order peers joined". They do agree on
//! the set, and [`PeerId`] has a total order, so sorting the set gives
//! every device the same sequence with no coordination:
//!
//! ```text
//!   roster {C, A, B}  ──sort──▶  [A, B, C]
//!
//!   next_after(A) = B
//!   next_after(C) = A                  (wraps)
//!   next_after_excluding(A, B) = C     (skips the unwanted peer)
//! ```
//!
//! A [`TurnOrder`] is a snapshot. It is cheap to rebuild and is meant to
//! be recomputed from the roster for every query.

use huddle_transport::PeerId;

use crate::TurnOrderError;

/// The session-wide turn sequence for one roster snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOrder {
    local: PeerId,
    peers: Vec<PeerId>,
}

impl TurnOrder {
    /// Builds the order for `local` plus `others`.
    ///
    /// Duplicates (including `local` appearing in `others`) are ignored.
    pub fn new(local: PeerId, others: impl IntoIterator<Item = PeerId>) -> Self {
        let mut peers: Vec<PeerId> = others.into_iter().collect();
        peers.push(local);
        peers.sort_unstable();
        peers.dedup();
        Self { local, peers }
    }

    /// The local device's id.
    pub fn local(&self) -> PeerId {
        self.local
    }

    /// All members including the local device, ascending.
    pub fn sorted_peers(&self) -> &[PeerId] {
        &self.peers
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Always `false`: the local device is a member of every order.
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Whether `peer` is a member.
    pub fn contains(&self, peer: PeerId) -> bool {
        self.peers.binary_search(&peer).is_ok()
    }

    /// The first member, in order, that isn't in `excluding`.
    ///
    /// # Errors
    /// `TurnOrderError::Exhausted` if `excluding` covers every member.
    pub fn first(&self, excluding: &[PeerId]) -> Result<PeerId, TurnOrderError> {
        self.peers
            .iter()
            .copied()
            .find(|peer| !excluding.contains(peer))
            .ok_or(TurnOrderError::Exhausted)
    }

    /// The member after `peer`, wrapping from the last back to the first.
    ///
    /// # Errors
    /// `TurnOrderError::NotInRoster` if `peer` isn't a member.
    pub fn next_after(&self, peer: PeerId) -> Result<PeerId, TurnOrderError> {
        let index = self
            .peers
            .binary_search(&peer)
            .map_err(|_| TurnOrderError::NotInRoster(peer))?;
        Ok(self.peers[(index + 1) % self.peers.len()])
    }

    /// Like [`next_after`](Self::next_after), but keeps going past
    /// `unwanted`.
    ///
    /// With two members this returns `peer` itself when the other member
    /// is `unwanted`.
    ///
    /// # Errors
    /// - `TurnOrderError::NotInRoster` if `peer` isn't a member.
    /// - `TurnOrderError::SoleMember` if `unwanted` is the only member.
    pub fn next_after_excluding(
        &self,
        peer: PeerId,
        unwanted: PeerId,
    ) -> Result<PeerId, TurnOrderError> {
        let mut candidate = self.next_after(peer)?;
        for _ in 0..self.peers.len() {
            if candidate != unwanted {
                return Ok(candidate);
            }
            candidate = self.next_after(candidate)?;
        }
        Err(TurnOrderError::SoleMember(unwanted))
    }

    /// [`next_after_excluding`](Self::next_after_excluding) starting from
    /// the local device.
    pub fn next_after_local(&self, unwanted: PeerId) -> Result<PeerId, TurnOrderError> {
        self.next_after_excluding(self.local, unwanted)
    }
}
