//! The running game, whichever it is.

use huddle_protocol::{Codec, GameKind, PeerId, ProtocolError};
use huddle_session::TurnOrder;

use crate::{
    AbandonReason, ActionOutcome, GameAction, GameContext, GameError, GameEvent, GameSetup,
    GameStateChannel, Hangman, LossOutcome, TwentyQuestions,
};

/// Tagged union of every game module. The coordinator holds at most one.
#[derive(Debug, Clone)]
pub enum ActiveGame {
    Hangman(Hangman),
    Questions(TwentyQuestions),
}

impl ActiveGame {
    /// Starts a new round with `picker` as the picker.
    pub fn start(setup: &GameSetup, picker: PeerId, turn: &TurnOrder) -> Result<Self, GameError> {
        match setup {
            GameSetup::Hangman { word } => Hangman::start(word, picker, turn).map(Self::Hangman),
            GameSetup::TwentyQuestions { subject } => {
                TwentyQuestions::start(subject, picker, turn).map(Self::Questions)
            }
        }
    }

    /// Decodes the full state carried by a `setGame` command.
    pub fn decode<C: Codec>(kind: GameKind, codec: &C, payload: &[u8]) -> Result<Self, ProtocolError> {
        match kind {
            GameKind::Hangman => Hangman::decode(codec, payload).map(Self::Hangman),
            GameKind::TwentyQuestions => {
                TwentyQuestions::decode(codec, payload).map(Self::Questions)
            }
        }
    }
}

impl GameStateChannel for ActiveGame {
    fn kind(&self) -> GameKind {
        match self {
            Self::Hangman(game) => game.kind(),
            Self::Questions(game) => game.kind(),
        }
    }

    fn encode_state<C: Codec>(&self, codec: &C) -> Result<Vec<u8>, ProtocolError> {
        match self {
            Self::Hangman(game) => game.encode_state(codec),
            Self::Questions(game) => game.encode_state(codec),
        }
    }

    fn apply_payload<C: Codec>(
        &mut self,
        payload: &[u8],
        ctx: &mut GameContext<'_, C>,
    ) -> Result<(), GameError> {
        match self {
            Self::Hangman(game) => game.apply_payload(payload, ctx),
            Self::Questions(game) => game.apply_payload(payload, ctx),
        }
    }

    fn perform<C: Codec>(
        &mut self,
        action: GameAction,
        ctx: &mut GameContext<'_, C>,
    ) -> Result<ActionOutcome, GameError> {
        match self {
            Self::Hangman(game) => game.perform(action, ctx),
            Self::Questions(game) => game.perform(action, ctx),
        }
    }

    fn abandon_reason(&self, lost: &[PeerId], turn: &TurnOrder) -> Option<AbandonReason> {
        match self {
            Self::Hangman(game) => game.abandon_reason(lost, turn),
            Self::Questions(game) => game.abandon_reason(lost, turn),
        }
    }

    fn handle_lost_peers<C: Codec>(
        &mut self,
        lost: &[PeerId],
        ctx: &mut GameContext<'_, C>,
    ) -> Result<LossOutcome, GameError> {
        match self {
            Self::Hangman(game) => game.handle_lost_peers(lost, ctx),
            Self::Questions(game) => game.handle_lost_peers(lost, ctx),
        }
    }

    fn state_event(&self) -> GameEvent {
        match self {
            Self::Hangman(game) => game.state_event(),
            Self::Questions(game) => game.state_event(),
        }
    }

    fn is_finished(&self) -> bool {
        match self {
            Self::Hangman(game) => game.is_finished(),
            Self::Questions(game) => game.is_finished(),
        }
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
    fn test_start_picks_module_by_setup() {
        let turn = TurnOrder::new(pid(1), [pid(2)]);
        let hangman = ActiveGame::start(&GameSetup::Hangman { word: "cat".into() }, pid(1), &turn);
        let questions = ActiveGame::start(
            &GameSetup::TwentyQuestions {
                subject: "the moon".into(),
            },
            pid(1),
            &turn,
        );

        assert_eq!(hangman.unwrap().kind(), GameKind::Hangman);
        assert_eq!(questions.unwrap().kind(), GameKind::TwentyQuestions);
    }

    #[test]
    fn test_decode_round_trips_full_state() {
        let turn = TurnOrder::new(pid(1), [pid(2)]);
        let game = ActiveGame::start(&GameSetup::Hangman { word: "cat".into() }, pid(1), &turn)
            .unwrap();
        let bytes = game.encode_state(&JsonCodec).unwrap();

        let decoded = ActiveGame::decode(GameKind::Hangman, &JsonCodec, &bytes).unwrap();

        assert_eq!(decoded.encode_state(&JsonCodec).unwrap(), bytes);
        assert!(!decoded.is_finished());
    }

    #[test]
    fn test_decode_with_wrong_kind_fails() {
        let turn = TurnOrder::new(pid(1), [pid(2)]);
        let game = ActiveGame::start(&GameSetup::Hangman { word: "cat".into() }, pid(1), &turn)
            .unwrap();
        let bytes = game.encode_state(&JsonCodec).unwrap();

        assert!(ActiveGame::decode(GameKind::TwentyQuestions, &JsonCodec, &bytes).is_err());
    }
}
