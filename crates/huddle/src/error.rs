//! Unified error type for Huddle.

use huddle_games::GameError;
use huddle_protocol::ProtocolError;
use huddle_session::TurnOrderError;
use huddle_transport::TransportError;

/// Top-level error that wraps every crate-specific error.
///
/// The `#[from]` attribute on each wrapping variant lets `?` convert
/// sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum HuddleError {
    /// The mesh failed to deliver or accept.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// An envelope or payload failed to encode or decode.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Turn order couldn't answer while applying a local action. Always
    /// a logic bug; debug builds panic before returning it.
    #[error(transparent)]
    TurnOrder(#[from] TurnOrderError),

    /// The active game rejected the request.
    #[error(transparent)]
    Game(#[from] GameError),

    /// A game action arrived with no game running.
    #[error("no game is active")]
    NoActiveGame,

    /// The coordinator task has stopped.
    #[error("coordinator is no longer running")]
    Unavailable,
}

#[cfg(test)]
mod tests {
    use super::*;
    use huddle_transport::PeerId;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let huddle_err: HuddleError = err.into();
        assert!(matches!(huddle_err, HuddleError::Transport(_)));
        assert!(huddle_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::UnknownCommand("explode".into());
        let huddle_err: HuddleError = err.into();
        assert!(matches!(huddle_err, HuddleError::Protocol(_)));
    }

    #[test]
    fn test_from_turn_order_error() {
        let err = TurnOrderError::NotInRoster(PeerId::new(3));
        let huddle_err: HuddleError = err.into();
        assert!(matches!(huddle_err, HuddleError::TurnOrder(_)));
    }

    #[test]
    fn test_from_game_error() {
        let huddle_err: HuddleError = GameError::GameOver.into();
        assert!(matches!(huddle_err, HuddleError::Game(GameError::GameOver)));
    }
}
