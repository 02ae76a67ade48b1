//! Error types for the session layer.

use huddle_transport::PeerId;

/// A turn-order query whose precondition didn't hold.
///
/// These mean the caller asked about a roster that can't answer, which
/// is a logic bug upstream rather than a network condition. Callers log
/// them at `error!` and carry on without changing state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TurnOrderError {
    /// Every member of the roster was excluded.
    #[error("every peer in the roster is excluded")]
    Exhausted,

    /// The peer asked about is not in the roster.
    #[error("peer {0} is not in the roster")]
    NotInRoster(PeerId),

    /// The only member of the roster is the one to skip.
    #[error("peer {0} is the only member of the roster")]
    SoleMember(PeerId),
}
