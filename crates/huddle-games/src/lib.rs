//! Game modules for Huddle.
//!
//! Games plug into the coordinator through one contract,
//! [`GameStateChannel`], and synchronize by broadcasting whole immutable
//! snapshots rather than moves.
//!
//! # Key types
//!
//! - [`GameStateChannel`] — the trait every game module implements
//! - [`GameContext`] — what a module can read and emit during one call
//! - [`ActiveGame`] — the running game, as a tagged union of modules
//! - [`Hangman`] / [`HangmanSnapshot`] — guess the picker's word
//! - [`TwentyQuestions`] / [`QuestionsSnapshot`] — guess the picker's subject

mod active;
mod channel;
mod error;
pub mod hangman;
pub mod questions;

pub use active::ActiveGame;
pub use channel::{
    AbandonReason, ActionOutcome, GameAction, GameCommand, GameContext, GameEvent, GameSetup,
    GameStateChannel, LossOutcome,
};
pub use error::GameError;
pub use hangman::{GuessResult, Hangman, HangmanEvent, HangmanSnapshot, HangmanState};
pub use questions::{Answer, QuestionsEvent, QuestionsSnapshot, QuestionsState, TwentyQuestions};
