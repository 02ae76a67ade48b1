//! The `GameStateChannel` trait — the contract every game module implements.
//!
//! A game module never touches the network. The coordinator hands it a
//! [`GameContext`] for each call; the module reads the local id and a
//! freshly computed turn order from it, and writes back two things:
//!
//! - **outbound game commands**, which the coordinator wraps in
//!   `gameData` envelopes and broadcasts to every connected peer, and
//! - **presentation events**, which the coordinator forwards to the UI.
//!
//! ```text
//!   Coordinator ──(payload | action | lost peers, &mut GameContext)──▶ game module
//!        ▲                                                               │
//!        └────────── ctx.outbound (SetState bytes), ctx.events ──────────┘
//! ```
//!
//! Every module synchronizes the same way: each change produces a new,
//! immutable snapshot of the whole game, which is broadcast as
//! `{ "commandType": "setState", "payload": <snapshot bytes> }` and
//! replaces the receiver's state outright.

use std::fmt;

use serde::{Deserialize, Serialize};

use huddle_protocol::{Codec, GameKind, PeerId, ProtocolError};
use huddle_session::{TurnOrder, TurnOrderError};

use crate::GameError;
use crate::hangman::{GuessResult, HangmanEvent};
use crate::questions::{Answer, QuestionsEvent};

// ---------------------------------------------------------------------------
// Inner command
// ---------------------------------------------------------------------------

/// The game-private command carried inside a `gameData` envelope.
///
/// Adjacently tagged, so the payload stays opaque bytes next to the tag:
/// `{ "commandType": "setState", "payload": [..] }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "commandType", content = "payload", rename_all = "camelCase")]
pub enum GameCommand {
    /// Replace the receiver's state with this encoded snapshot.
    SetState(Vec<u8>),
}

// ---------------------------------------------------------------------------
// Setup, actions, outcomes, events
// ---------------------------------------------------------------------------

/// What a peer chose when starting a new round. The local peer becomes
/// the picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameSetup {
    Hangman { word: String },
    TwentyQuestions { subject: String },
}

impl GameSetup {
    /// Which game this setup starts.
    pub fn kind(&self) -> GameKind {
        match self {
            Self::Hangman { .. } => GameKind::Hangman,
            Self::TwentyQuestions { .. } => GameKind::TwentyQuestions,
        }
    }
}

/// A local user intent routed to the active game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameAction {
    /// Hangman: guess one letter. The raw input is validated by the game.
    Guess(String),
    /// Twenty Questions: ask the picker a yes/no question.
    Ask(String),
    /// Twenty Questions: the picker answers the pending question.
    Answer(Answer),
    /// Twenty Questions: spend a question on naming the subject.
    GuessSubject(String),
}

impl GameAction {
    /// Short name for logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Guess(_) => "guess",
            Self::Ask(_) => "ask",
            Self::Answer(_) => "answer",
            Self::GuessSubject(_) => "guessSubject",
        }
    }
}

/// What a successful [`GameAction`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    Guess(GuessResult),
    Asked,
    Answered(Answer),
    SubjectGuess { correct: bool },
}

/// Whether a game survives losing some peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LossOutcome {
    /// The game goes on, possibly with a new guesser.
    Continues,
    /// The game can't continue and should be dropped.
    Abandoned,
}

/// Why a game was abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbandonReason {
    /// The picker left, taking the secret with them.
    PickerLost(PeerId),
    /// Nobody but the picker is left to play.
    NoPlayersLeft,
}

impl fmt::Display for AbandonReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PickerLost(peer) => write!(f, "picker {peer} left"),
            Self::NoPlayersLeft => write!(f, "no players left"),
        }
    }
}

/// A presentation event from a game module.
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    Hangman(HangmanEvent),
    Questions(QuestionsEvent),
    Abandoned { kind: GameKind, reason: AbandonReason },
}

// ---------------------------------------------------------------------------
// GameContext
// ---------------------------------------------------------------------------

/// Everything a game module may read or produce during one call.
pub struct GameContext<'a, C: Codec> {
    local: PeerId,
    turn: TurnOrder,
    codec: &'a C,
    outbound: Vec<Vec<u8>>,
    events: Vec<GameEvent>,
}

impl<'a, C: Codec> GameContext<'a, C> {
    /// Creates a context for one call. `turn` must reflect the roster
    /// as it is right now.
    pub fn new(turn: TurnOrder, codec: &'a C) -> Self {
        Self {
            local: turn.local(),
            turn,
            codec,
            outbound: Vec::new(),
            events: Vec::new(),
        }
    }

    /// The local device's id.
    pub fn local(&self) -> PeerId {
        self.local
    }

    /// The current turn order.
    pub fn turn(&self) -> &TurnOrder {
        &self.turn
    }

    /// The session codec, for the module's own payloads.
    pub fn codec(&self) -> &C {
        self.codec
    }

    /// Queues a game command for broadcast to every connected peer.
    pub fn send_game_command(&mut self, command: &GameCommand) -> Result<(), ProtocolError> {
        let bytes = self.codec.encode(command)?;
        self.outbound.push(bytes);
        Ok(())
    }

    /// Queues a presentation event.
    pub fn notify(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    /// Encoded game commands queued so far.
    pub fn outbound(&self) -> &[Vec<u8>] {
        &self.outbound
    }

    /// Events queued so far.
    pub fn events(&self) -> &[GameEvent] {
        &self.events
    }

    /// Consumes the context, returning `(outbound, events)`.
    pub fn into_parts(self) -> (Vec<Vec<u8>>, Vec<GameEvent>) {
        (self.outbound, self.events)
    }
}

// ---------------------------------------------------------------------------
// GameStateChannel
// ---------------------------------------------------------------------------

/// The contract between the coordinator and a game module.
///
/// Implementations hold one immutable snapshot and replace it on every
/// change. Methods that fail must leave the snapshot untouched and queue
/// nothing on the context.
pub trait GameStateChannel {
    /// Which game this is.
    fn kind(&self) -> GameKind;

    /// Encodes the full current state, as carried by `setGame`.
    fn encode_state<C: Codec>(&self, codec: &C) -> Result<Vec<u8>, ProtocolError>;

    /// Handles the inner payload of a `gameData` envelope.
    ///
    /// # Errors
    /// `GameError::Protocol` if the payload doesn't decode. The current
    /// state is kept.
    fn apply_payload<C: Codec>(
        &mut self,
        payload: &[u8],
        ctx: &mut GameContext<'_, C>,
    ) -> Result<(), GameError>;

    /// Applies a local user intent, broadcasting the resulting snapshot.
    fn perform<C: Codec>(
        &mut self,
        action: GameAction,
        ctx: &mut GameContext<'_, C>,
    ) -> Result<ActionOutcome, GameError>;

    /// Whether losing `lost` would end the game, leaving `turn` behind.
    ///
    /// Pure: every peer can ask this, while only the host goes on to
    /// [`handle_lost_peers`](Self::handle_lost_peers).
    fn abandon_reason(&self, lost: &[PeerId], turn: &TurnOrder) -> Option<AbandonReason>;

    /// Reacts to a debounced batch of lost peers.
    fn handle_lost_peers<C: Codec>(
        &mut self,
        lost: &[PeerId],
        ctx: &mut GameContext<'_, C>,
    ) -> Result<LossOutcome, GameError>;

    /// The event describing the current state, for announcing a game
    /// that was just started or received.
    fn state_event(&self) -> GameEvent;

    /// Whether the game has reached a terminal state.
    fn is_finished(&self) -> bool;
}

/// The peer whose turn follows `current`, never the picker.
///
/// If `current` already left the roster, play restarts from the first
/// non-picker peer instead.
pub(crate) fn next_turn(
    turn: &TurnOrder,
    current: PeerId,
    picker: PeerId,
) -> Result<PeerId, TurnOrderError> {
    if turn.contains(current) {
        turn.next_after_excluding(current, picker)
    } else {
        turn.first(&[picker])
    }
}

/// Decodes the inner command of a `gameData` payload.
pub(crate) fn decode_set_state<C: Codec>(codec: &C, payload: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    match codec.decode::<GameCommand>(payload)? {
        GameCommand::SetState(state) => Ok(state),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use huddle_protocol::JsonCodec;

    fn pid(n: u64) -> PeerId {
        PeerId::new(n)
    }

    #[test]
    fn test_game_command_json_format() {
        let json = serde_json::to_value(GameCommand::SetState(vec![1, 2])).unwrap();
        assert_eq!(json, serde_json::json!({"commandType": "setState", "payload": [1, 2]}));
    }

    #[test]
    fn test_context_send_game_command_encodes_with_codec() {
        let mut ctx = GameContext::new(TurnOrder::new(pid(1), []), &JsonCodec);
        ctx.send_game_command(&GameCommand::SetState(vec![7])).unwrap();

        let (outbound, events) = ctx.into_parts();
        assert_eq!(outbound.len(), 1);
        assert_eq!(decode_set_state(&JsonCodec, &outbound[0]).unwrap(), vec![7]);
        assert!(events.is_empty());
    }

    #[test]
    fn test_decode_set_state_unknown_command_type_fails() {
        let bytes = br#"{"commandType": "explode", "payload": []}"#;
        assert!(decode_set_state(&JsonCodec, bytes).is_err());
    }

    #[test]
    fn test_next_turn_skips_picker() {
        let turn = TurnOrder::new(pid(1), [pid(2), pid(3)]);
        assert_eq!(next_turn(&turn, pid(3), pid(1)), Ok(pid(2)));
    }

    #[test]
    fn test_next_turn_departed_current_restarts_from_first() {
        let turn = TurnOrder::new(pid(1), [pid(3), pid(4)]);
        assert_eq!(next_turn(&turn, pid(2), pid(1)), Ok(pid(3)));
    }
}
