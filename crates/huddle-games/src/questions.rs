//! Twenty Questions: the picker thinks of a subject, the others take
//! turns asking yes/no questions until someone names it or the
//! questions run out.
//!
//! Turn flow inside one round:
//!
//! ```text
//!   asker: ask ──▶ picker: answer ──▶ next asker: ask ──▶ ...
//!      │
//!      └─ guess_subject (uses up a question; right ⇒ SubjectGuessed)
//! ```
//!
//! After [`QUESTION_BUDGET`] answered questions with no correct guess the
//! round ends in `NoMoreQuestions`.

use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};

use huddle_protocol::{Codec, GameKind, PeerId, ProtocolError};
use huddle_session::TurnOrder;

use crate::channel::{decode_set_state, next_turn};
use crate::hangman::{WordChoice, check_valid_choice};
use crate::{
    AbandonReason, ActionOutcome, GameAction, GameCommand, GameContext, GameError, GameEvent,
    GameStateChannel, LossOutcome,
};

/// Answered questions (including subject guesses) before the askers lose.
pub const QUESTION_BUDGET: usize = 20;

/// Longest question, in characters, after trimming.
pub const MAX_QUESTION_CHARS: usize = 200;

/// Why a question was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum QuestionRejection {
    #[error("question is empty")]
    TooShort,
    #[error("question is longer than {MAX_QUESTION_CHARS} characters")]
    TooLong,
}

/// Trims a question and checks its length.
pub fn sanitize_question(raw: &str) -> Result<String, QuestionRejection> {
    let trimmed = raw.trim();
    match trimmed.chars().count() {
        0 => Err(QuestionRejection::TooShort),
        n if n > MAX_QUESTION_CHARS => Err(QuestionRejection::TooLong),
        _ => Ok(trimmed.to_owned()),
    }
}

/// The picker's answer to a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Answer {
    Yes,
    No,
    Unsure,
}

/// One asked question and, once given, its answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionEntry {
    pub question: String,
    #[serde(rename = "askerData")]
    pub asker: PeerId,
    #[serde(default)]
    pub answer: Option<Answer>,
    /// `true` when this entry is an attempt to name the subject.
    #[serde(default)]
    pub subject_guess: bool,
}

/// Where a round stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionsState {
    InProgress,
    SubjectGuessed,
    NoMoreQuestions,
}

fn instance_id() -> u64 {
    rand::rng().random()
}

/// The entire state of one Twenty Questions round.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionsSnapshot {
    subject: String,
    questions: Vec<QuestionEntry>,
    #[serde(rename = "pickerData")]
    picker: PeerId,
    #[serde(rename = "askerData")]
    asker: PeerId,
    #[serde(rename = "solvedByData", default)]
    solved_by: Option<PeerId>,
    #[serde(skip, default = "instance_id")]
    instance: u64,
}

impl PartialEq for QuestionsSnapshot {
    fn eq(&self, other: &Self) -> bool {
        self.subject == other.subject
            && self.questions == other.questions
            && self.picker == other.picker
            && self.asker == other.asker
            && self.solved_by == other.solved_by
    }
}

impl Eq for QuestionsSnapshot {}

impl QuestionsSnapshot {
    /// A fresh round. `subject` is trimmed.
    pub fn new(subject: &str, picker: PeerId, asker: PeerId) -> Self {
        Self {
            subject: subject.trim().to_owned(),
            questions: Vec::new(),
            picker,
            asker,
            solved_by: None,
            instance: instance_id(),
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn questions(&self) -> &[QuestionEntry] {
        &self.questions
    }

    pub fn picker(&self) -> PeerId {
        self.picker
    }

    pub fn asker(&self) -> PeerId {
        self.asker
    }

    /// Who named the subject, if anyone has.
    pub fn solved_by(&self) -> Option<PeerId> {
        self.solved_by
    }

    /// The question waiting for the picker, if any.
    pub fn pending_question(&self) -> Option<&QuestionEntry> {
        self.questions.last().filter(|entry| entry.answer.is_none())
    }

    /// Questions that have been answered, subject guesses included.
    pub fn answered(&self) -> usize {
        self.questions.iter().filter(|q| q.answer.is_some()).count()
    }

    pub fn questions_remaining(&self) -> usize {
        QUESTION_BUDGET.saturating_sub(self.answered())
    }

    pub fn state(&self) -> QuestionsState {
        if self.solved_by.is_some() {
            QuestionsState::SubjectGuessed
        } else if self.answered() >= QUESTION_BUDGET {
            QuestionsState::NoMoreQuestions
        } else {
            QuestionsState::InProgress
        }
    }

    pub fn same_instance(&self, other: &Self) -> bool {
        self.instance == other.instance
    }

    fn matches_subject(&self, guess: &str) -> bool {
        guess.trim().to_lowercase() == self.subject.to_lowercase()
    }
}

/// Presentation events from a Twenty Questions round.
#[derive(Debug, Clone, PartialEq)]
pub enum QuestionsEvent {
    StateChanged { snapshot: Arc<QuestionsSnapshot> },
    Concluded {
        state: QuestionsState,
        subject: String,
        solved_by: Option<PeerId>,
    },
}

/// A running Twenty Questions round on this device.
#[derive(Debug, Clone)]
pub struct TwentyQuestions {
    snapshot: Arc<QuestionsSnapshot>,
}

impl TwentyQuestions {
    /// Starts a round where `picker` chose `subject`.
    pub fn start(subject: &str, picker: PeerId, turn: &TurnOrder) -> Result<Self, GameError> {
        match check_valid_choice(subject) {
            WordChoice::Good => {}
            rejected => return Err(GameError::InvalidChoice(rejected)),
        }
        let asker = turn
            .next_after_excluding(picker, picker)
            .map_err(|_| GameError::NotEnoughPeers)?;

        tracing::info!(%picker, %asker, "twenty questions round started");
        Ok(Self::from_snapshot(QuestionsSnapshot::new(subject, picker, asker)))
    }

    pub fn from_snapshot(snapshot: QuestionsSnapshot) -> Self {
        Self {
            snapshot: Arc::new(snapshot),
        }
    }

    /// Decodes a full-state payload as carried by `setGame`.
    pub fn decode<C: Codec>(codec: &C, payload: &[u8]) -> Result<Self, ProtocolError> {
        codec.decode(payload).map(Self::from_snapshot)
    }

    pub fn snapshot(&self) -> &Arc<QuestionsSnapshot> {
        &self.snapshot
    }

    pub fn state(&self) -> QuestionsState {
        self.snapshot.state()
    }

    fn ensure_asker_turn(&self, local: PeerId) -> Result<(), GameError> {
        if self.is_finished() {
            return Err(GameError::GameOver);
        }
        if local != self.snapshot.asker {
            return Err(GameError::NotYourTurn {
                expected: self.snapshot.asker,
            });
        }
        if self.snapshot.pending_question().is_some() {
            return Err(GameError::QuestionPending);
        }
        Ok(())
    }

    /// Asks the picker a question. Only the current asker may ask, and
    /// only when no question is waiting.
    pub fn ask<C: Codec>(&mut self, raw: &str, ctx: &mut GameContext<'_, C>) -> Result<(), GameError> {
        self.ensure_asker_turn(ctx.local())?;
        let question = sanitize_question(raw).map_err(GameError::InvalidQuestion)?;

        let mut next = (*self.snapshot).clone();
        next.questions.push(QuestionEntry {
            question,
            asker: ctx.local(),
            answer: None,
            subject_guess: false,
        });
        tracing::debug!(asker = %ctx.local(), "question asked");
        self.broadcast(next, ctx)
    }

    /// Answers the pending question and passes the turn on. Only the
    /// picker may answer.
    pub fn answer<C: Codec>(
        &mut self,
        answer: Answer,
        ctx: &mut GameContext<'_, C>,
    ) -> Result<(), GameError> {
        if self.is_finished() {
            return Err(GameError::GameOver);
        }
        let picker = self.snapshot.picker;
        if ctx.local() != picker {
            return Err(GameError::NotYourTurn { expected: picker });
        }
        if self.snapshot.pending_question().is_none() {
            return Err(GameError::NoPendingQuestion);
        }
        let asker = next_turn(ctx.turn(), self.snapshot.asker, picker)?;

        let mut next = (*self.snapshot).clone();
        if let Some(entry) = next.questions.last_mut() {
            entry.answer = Some(answer);
        }
        next.asker = asker;
        tracing::debug!(?answer, next_asker = %asker, "question answered");
        self.broadcast(next, ctx)
    }

    /// Spends a question on naming the subject. Returns whether it was
    /// right. Matching ignores case and surrounding whitespace.
    pub fn guess_subject<C: Codec>(
        &mut self,
        raw: &str,
        ctx: &mut GameContext<'_, C>,
    ) -> Result<bool, GameError> {
        self.ensure_asker_turn(ctx.local())?;
        let guess = sanitize_question(raw).map_err(GameError::InvalidQuestion)?;
        let correct = self.snapshot.matches_subject(&guess);

        let mut next = (*self.snapshot).clone();
        next.questions.push(QuestionEntry {
            question: guess,
            asker: ctx.local(),
            answer: Some(if correct { Answer::Yes } else { Answer::No }),
            subject_guess: true,
        });
        if correct {
            next.solved_by = Some(ctx.local());
        } else {
            next.asker = next_turn(ctx.turn(), self.snapshot.asker, self.snapshot.picker)?;
        }
        tracing::debug!(asker = %ctx.local(), correct, "subject guessed");
        self.broadcast(next, ctx)?;
        Ok(correct)
    }

    /// Replaces the local state with `snapshot` and notifies the UI.
    pub fn apply_inbound<C: Codec>(
        &mut self,
        snapshot: QuestionsSnapshot,
        ctx: &mut GameContext<'_, C>,
    ) {
        self.snapshot = Arc::new(snapshot);

        ctx.notify(self.state_event());
        let state = self.state();
        if state != QuestionsState::InProgress {
            tracing::info!(?state, "twenty questions round concluded");
            ctx.notify(GameEvent::Questions(QuestionsEvent::Concluded {
                state,
                subject: self.snapshot.subject.clone(),
                solved_by: self.snapshot.solved_by,
            }));
        }
    }

    fn broadcast<C: Codec>(
        &mut self,
        next: QuestionsSnapshot,
        ctx: &mut GameContext<'_, C>,
    ) -> Result<(), GameError> {
        let state = ctx.codec().encode(&next)?;
        ctx.send_game_command(&GameCommand::SetState(state))?;
        self.apply_inbound(next, ctx);
        Ok(())
    }
}

impl GameStateChannel for TwentyQuestions {
    fn kind(&self) -> GameKind {
        GameKind::TwentyQuestions
    }

    fn encode_state<C: Codec>(&self, codec: &C) -> Result<Vec<u8>, ProtocolError> {
        codec.encode(&*self.snapshot)
    }

    fn apply_payload<C: Codec>(
        &mut self,
        payload: &[u8],
        ctx: &mut GameContext<'_, C>,
    ) -> Result<(), GameError> {
        let state = decode_set_state(ctx.codec(), payload)?;
        let mut snapshot: QuestionsSnapshot = ctx.codec().decode(&state)?;
        snapshot.instance = self.snapshot.instance;
        self.apply_inbound(snapshot, ctx);
        Ok(())
    }

    fn perform<C: Codec>(
        &mut self,
        action: GameAction,
        ctx: &mut GameContext<'_, C>,
    ) -> Result<ActionOutcome, GameError> {
        match action {
            GameAction::Ask(question) => self.ask(&question, ctx).map(|()| ActionOutcome::Asked),
            GameAction::Answer(answer) => self
                .answer(answer, ctx)
                .map(|()| ActionOutcome::Answered(answer)),
            GameAction::GuessSubject(guess) => self
                .guess_subject(&guess, ctx)
                .map(|correct| ActionOutcome::SubjectGuess { correct }),
            other @ GameAction::Guess(_) => Err(GameError::WrongGame {
                action: other.name(),
                game: GameKind::TwentyQuestions,
            }),
        }
    }

    fn abandon_reason(&self, lost: &[PeerId], turn: &TurnOrder) -> Option<AbandonReason> {
        if self.is_finished() {
            return None;
        }
        let picker = self.snapshot.picker;
        if lost.contains(&picker) {
            return Some(AbandonReason::PickerLost(picker));
        }
        if lost.contains(&self.snapshot.asker) && turn.first(&[picker]).is_err() {
            return Some(AbandonReason::NoPlayersLeft);
        }
        None
    }

    fn handle_lost_peers<C: Codec>(
        &mut self,
        lost: &[PeerId],
        ctx: &mut GameContext<'_, C>,
    ) -> Result<LossOutcome, GameError> {
        if let Some(reason) = self.abandon_reason(lost, ctx.turn()) {
            ctx.notify(GameEvent::Abandoned {
                kind: GameKind::TwentyQuestions,
                reason,
            });
            return Ok(LossOutcome::Abandoned);
        }
        if self.is_finished() || !lost.contains(&self.snapshot.asker) {
            return Ok(LossOutcome::Continues);
        }

        let asker = ctx.turn().first(&[self.snapshot.picker])?;
        tracing::info!(lost = %self.snapshot.asker, %asker, "asker left, passing turn");
        let mut next = QuestionsSnapshot {
            asker,
            ..(*self.snapshot).clone()
        };
        // An unanswered question from the departed asker would otherwise
        // be answered on the new asker's turn.
        if next.pending_question().is_some() {
            next.questions.pop();
        }
        self.broadcast(next, ctx)?;
        Ok(LossOutcome::Continues)
    }

    fn state_event(&self) -> GameEvent {
        GameEvent::Questions(QuestionsEvent::StateChanged {
            snapshot: Arc::clone(&self.snapshot),
        })
    }

    fn is_finished(&self) -> bool {
        self.state() != QuestionsState::InProgress
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use huddle_protocol::JsonCodec;

    fn pid(n: u64) -> PeerId {
        PeerId::new(n)
    }

    /// Picker 1; askers 2 and 3.
    fn game() -> TwentyQuestions {
        let turn = TurnOrder::new(pid(1), [pid(2), pid(3)]);
        TwentyQuestions::start("Eiffel Tower", pid(1), &turn).unwrap()
    }

    fn ctx_for(local: u64) -> GameContext<'static, JsonCodec> {
        let others = [1, 2, 3].into_iter().filter(|&n| n != local).map(pid);
        GameContext::new(TurnOrder::new(pid(local), others), &JsonCodec)
    }

    #[test]
    fn test_sanitize_question_limits() {
        assert_eq!(sanitize_question("  "), Err(QuestionRejection::TooShort));
        assert_eq!(sanitize_question(&"x".repeat(201)), Err(QuestionRejection::TooLong));
        assert_eq!(sanitize_question(" big? "), Ok("big?".to_owned()));
    }

    #[test]
    fn test_start_first_asker_follows_picker() {
        assert_eq!(game().snapshot().asker(), pid(2));
    }

    #[test]
    fn test_ask_then_answer_rotates_asker() {
        let mut g = game();

        g.ask("Is it a building?", &mut ctx_for(2)).unwrap();
        assert!(g.snapshot().pending_question().is_some());

        g.answer(Answer::Yes, &mut ctx_for(1)).unwrap();
        assert_eq!(g.snapshot().asker(), pid(3));
        assert_eq!(g.snapshot().answered(), 1);
        assert_eq!(g.snapshot().questions()[0].answer, Some(Answer::Yes));
    }

    #[test]
    fn test_ask_out_of_turn_is_rejected() {
        let mut g = game();
        let result = g.ask("Is it red?", &mut ctx_for(3));
        assert!(matches!(result, Err(GameError::NotYourTurn { expected }) if expected == pid(2)));
    }

    #[test]
    fn test_ask_while_pending_is_rejected() {
        let mut g = game();
        g.ask("Is it a building?", &mut ctx_for(2)).unwrap();
        let result = g.ask("Is it tall?", &mut ctx_for(2));
        assert!(matches!(result, Err(GameError::QuestionPending)));
    }

    #[test]
    fn test_answer_without_question_is_rejected() {
        let mut g = game();
        let result = g.answer(Answer::No, &mut ctx_for(1));
        assert!(matches!(result, Err(GameError::NoPendingQuestion)));
    }

    #[test]
    fn test_answer_by_non_picker_is_rejected() {
        let mut g = game();
        g.ask("Is it a building?", &mut ctx_for(2)).unwrap();
        let result = g.answer(Answer::No, &mut ctx_for(3));
        assert!(matches!(result, Err(GameError::NotYourTurn { expected }) if expected == pid(1)));
    }

    #[test]
    fn test_guess_subject_ignores_case_and_whitespace() {
        let mut g = game();
        let correct = g.guess_subject("  eiffel tower ", &mut ctx_for(2)).unwrap();

        assert!(correct);
        assert_eq!(g.state(), QuestionsState::SubjectGuessed);
        assert_eq!(g.snapshot().solved_by(), Some(pid(2)));
    }

    #[test]
    fn test_wrong_subject_guess_uses_a_question_and_passes_turn() {
        let mut g = game();
        let correct = g.guess_subject("Big Ben", &mut ctx_for(2)).unwrap();

        assert!(!correct);
        assert_eq!(g.snapshot().answered(), 1);
        assert_eq!(g.snapshot().asker(), pid(3));
        assert_eq!(g.state(), QuestionsState::InProgress);
    }

    #[test]
    fn test_budget_exhausted_ends_round() {
        let mut g = game();
        for _ in 0..QUESTION_BUDGET {
            let asker = g.snapshot().asker().key();
            g.ask("Is it alive?", &mut ctx_for(asker)).unwrap();
            g.answer(Answer::No, &mut ctx_for(1)).unwrap();
        }

        assert_eq!(g.state(), QuestionsState::NoMoreQuestions);
        let result = g.ask("Is it blue?", &mut ctx_for(g.snapshot().asker().key()));
        assert!(matches!(result, Err(GameError::GameOver)));
    }

    #[test]
    fn test_hangman_action_is_wrong_game() {
        let mut g = game();
        let result = g.perform(GameAction::Guess("e".into()), &mut ctx_for(2));
        assert!(matches!(result, Err(GameError::WrongGame { .. })));
    }

    #[test]
    fn test_snapshot_json_field_names() {
        let mut g = game();
        g.ask("Is it a building?", &mut ctx_for(2)).unwrap();
        let json = serde_json::to_value(&**g.snapshot()).unwrap();

        assert_eq!(json["subject"], "Eiffel Tower");
        assert_eq!(json["questions"][0]["question"], "Is it a building?");
        assert_eq!(json["questions"][0]["askerData"], serde_json::json!([0, 0, 0, 0, 0, 0, 0, 2]));
        assert!(json["questions"][0]["answer"].is_null());
        assert_eq!(json["pickerData"], serde_json::json!([0, 0, 0, 0, 0, 0, 0, 1]));
        assert!(json["solvedByData"].is_null());
    }

    #[test]
    fn test_snapshot_decode_reencode_is_idempotent() {
        let mut g = game();
        g.ask("Is it a building?", &mut ctx_for(2)).unwrap();
        g.answer(Answer::Unsure, &mut ctx_for(1)).unwrap();

        let bytes = g.encode_state(&JsonCodec).unwrap();
        let decoded = TwentyQuestions::decode(&JsonCodec, &bytes).unwrap();

        assert_eq!(decoded.snapshot(), g.snapshot());
        assert_eq!(decoded.encode_state(&JsonCodec).unwrap(), bytes);
    }

    #[test]
    fn test_lost_asker_passes_turn_and_drops_pending_question() {
        let mut g = game();
        g.ask("Is it a building?", &mut ctx_for(2)).unwrap();

        let mut ctx = GameContext::new(TurnOrder::new(pid(1), [pid(3)]), &JsonCodec);
        let outcome = g.handle_lost_peers(&[pid(2)], &mut ctx).unwrap();

        assert_eq!(outcome, LossOutcome::Continues);
        assert_eq!(g.snapshot().asker(), pid(3));
        assert!(g.snapshot().pending_question().is_none());
        assert!(g.snapshot().questions().is_empty());
    }

    #[test]
    fn test_lost_asker_new_asker_keeps_turn_until_answered() {
        let mut g = game();
        g.ask("Is it a building?", &mut ctx_for(2)).unwrap();
        let mut ctx = GameContext::new(TurnOrder::new(pid(1), [pid(3)]), &JsonCodec);
        g.handle_lost_peers(&[pid(2)], &mut ctx).unwrap();

        let two_left = || GameContext::new(TurnOrder::new(pid(1), [pid(3)]), &JsonCodec);
        let mut picker_ctx = two_left();
        let early = g.answer(Answer::Yes, &mut picker_ctx);
        assert!(matches!(early, Err(GameError::NoPendingQuestion)));

        let mut asker_ctx = GameContext::new(TurnOrder::new(pid(3), [pid(1)]), &JsonCodec);
        g.ask("Is it tall?", &mut asker_ctx).unwrap();
        g.answer(Answer::Yes, &mut two_left()).unwrap();
        assert_eq!(g.snapshot().asker(), pid(3));
        assert_eq!(g.snapshot().answered(), 1);
    }

    #[test]
    fn test_lost_asker_answered_history_is_kept() {
        let mut g = game();
        g.ask("Is it a building?", &mut ctx_for(2)).unwrap();
        g.answer(Answer::Yes, &mut ctx_for(1)).unwrap();
        g.ask("Is it tall?", &mut ctx_for(3)).unwrap();

        let mut ctx = GameContext::new(TurnOrder::new(pid(1), [pid(2)]), &JsonCodec);
        g.handle_lost_peers(&[pid(3)], &mut ctx).unwrap();

        assert_eq!(g.snapshot().asker(), pid(2));
        assert_eq!(g.snapshot().questions().len(), 1);
        assert_eq!(g.snapshot().answered(), 1);
    }

    #[test]
    fn test_abandon_reason_is_pure() {
        let g = game();
        let turn = TurnOrder::new(pid(2), [pid(3)]);
        assert_eq!(
            g.abandon_reason(&[pid(1)], &turn),
            Some(AbandonReason::PickerLost(pid(1)))
        );
        assert_eq!(g.abandon_reason(&[pid(3)], &turn), None);
        assert_eq!(g.snapshot().asker(), pid(2));
    }

    #[test]
    fn test_lost_picker_abandons() {
        let mut g = game();
        let mut ctx = GameContext::new(TurnOrder::new(pid(2), [pid(3)]), &JsonCodec);
        let outcome = g.handle_lost_peers(&[pid(1)], &mut ctx).unwrap();
        assert_eq!(outcome, LossOutcome::Abandoned);
    }
}
