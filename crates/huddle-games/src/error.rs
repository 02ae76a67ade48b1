//! Error types for the game layer.

use huddle_protocol::{GameKind, PeerId, ProtocolError};
use huddle_session::TurnOrderError;

use crate::hangman::{GuessRejection, WordChoice};
use crate::questions::QuestionRejection;

/// Errors a game module can return.
///
/// Every variant except `Protocol` is a local rejection: nothing was
/// changed and nothing was sent.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    /// The guessed letter failed validation.
    #[error("invalid guess: {0}")]
    InvalidGuess(GuessRejection),

    /// The question or subject guess failed validation.
    #[error("invalid question: {0}")]
    InvalidQuestion(QuestionRejection),

    /// The chosen secret word or subject isn't usable.
    #[error("invalid choice: {0}")]
    InvalidChoice(WordChoice),

    /// Someone else has the turn.
    #[error("not your turn, waiting on {expected}")]
    NotYourTurn { expected: PeerId },

    /// The round already ended.
    #[error("the game is over")]
    GameOver,

    /// The action belongs to a different game.
    #[error("{action} is not a {game} action")]
    WrongGame { action: &'static str, game: GameKind },

    /// A round needs at least one player besides the picker.
    #[error("not enough peers to play")]
    NotEnoughPeers,

    /// A question is already waiting for an answer.
    #[error("a question is already pending")]
    QuestionPending,

    /// There is no question to answer.
    #[error("no question is pending")]
    NoPendingQuestion,

    /// Turn order couldn't answer.
    #[error(transparent)]
    TurnOrder(#[from] TurnOrderError),

    /// A payload failed to encode or decode.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
