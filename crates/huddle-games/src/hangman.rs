//! Hangman: one picker chooses a secret word, everyone else takes turns
//! guessing letters.
//!
//! # State machine
//!
//! ```text
//!   InProgress ──(last hidden letter guessed)──▶ WordGuessed
//!        │
//!        └──(GUESS_BUDGET wrong letters)──────▶ NoMoreGuesses
//! ```
//!
//! Both terminal states are final. Everything the UI shows (the blanked
//! word, the blank count, the state) is derived from the snapshot on read.
//!
//! # Letters
//!
//! Only unaccented ASCII letters are hidden and guessable. Everything
//! else in the word (spaces, punctuation, digits, accented letters) is
//! always shown, so a word is never unwinnable.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};

use huddle_protocol::{Codec, GameKind, PeerId, ProtocolError};
use huddle_session::TurnOrder;

use crate::channel::{decode_set_state, next_turn};
use crate::{
    AbandonReason, ActionOutcome, GameAction, GameCommand, GameContext, GameError, GameEvent,
    GameStateChannel, LossOutcome,
};

/// Fewest letters a secret word may have.
pub const MIN_WORD_LETTERS: usize = 3;

/// Most letters a secret word may have.
pub const MAX_WORD_LETTERS: usize = 100;

/// Wrong letters allowed before the guessers lose.
pub const GUESS_BUDGET: usize = 9;

/// Shown in place of a letter that hasn't been guessed yet.
pub const PLACEHOLDER: char = '_';

// ---------------------------------------------------------------------------
// Pure helpers
// ---------------------------------------------------------------------------

/// Why a raw guess was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GuessRejection {
    #[error("guess is empty")]
    TooShort,
    #[error("guess must be a single letter")]
    TooLong,
    #[error("guess must be a letter A-Z")]
    InvalidCharacter,
    #[error("letter was already guessed")]
    AlreadyGuessed,
}

/// Validates raw user input as a guess against `snapshot`.
///
/// Checks run in a fixed order so every peer rejects the same input for
/// the same reason: trim, empty, length, case fold, alphabet, repeats.
/// The length check comes before case folding, so `"cat"` is `TooLong`.
pub fn sanitize_guess(raw: &str, snapshot: &HangmanSnapshot) -> Result<char, GuessRejection> {
    let trimmed = raw.trim();
    let mut chars = trimmed.chars();
    let Some(first) = chars.next() else {
        return Err(GuessRejection::TooShort);
    };
    if chars.next().is_some() {
        return Err(GuessRejection::TooLong);
    }

    let letter = first.to_ascii_uppercase();
    if !letter.is_ascii_uppercase() {
        return Err(GuessRejection::InvalidCharacter);
    }
    if snapshot.has_guessed(letter) {
        return Err(GuessRejection::AlreadyGuessed);
    }
    Ok(letter)
}

/// A word with unrevealed letters blanked out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Obfuscated {
    /// The word with each hidden letter replaced by [`PLACEHOLDER`].
    pub text: String,
    /// How many letters are still hidden.
    pub blanks: usize,
}

impl fmt::Display for Obfuscated {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Blanks every ASCII letter of `word` that isn't in `revealed`.
///
/// `revealed` holds uppercase letters; matching is case-insensitive.
/// Non-letters are always shown.
pub fn obfuscate(word: &str, revealed: &BTreeSet<char>) -> Obfuscated {
    let mut blanks = 0;
    let text = word
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphabetic() && !revealed.contains(&ch.to_ascii_uppercase()) {
                blanks += 1;
                PLACEHOLDER
            } else {
                ch
            }
        })
        .collect();
    Obfuscated { text, blanks }
}

/// How a candidate secret word measures up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordChoice {
    TooShort,
    TooLong,
    Good,
}

impl fmt::Display for WordChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort => write!(f, "needs at least {MIN_WORD_LETTERS} letters"),
            Self::TooLong => write!(f, "may have at most {MAX_WORD_LETTERS} letters"),
            Self::Good => write!(f, "good"),
        }
    }
}

/// Classifies a candidate word by counting its ASCII letters only.
pub fn check_valid_choice(word: &str) -> WordChoice {
    let letters = word.chars().filter(char::is_ascii_alphabetic).count();
    if letters < MIN_WORD_LETTERS {
        WordChoice::TooShort
    } else if letters > MAX_WORD_LETTERS {
        WordChoice::TooLong
    } else {
        WordChoice::Good
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Where a round stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HangmanState {
    InProgress,
    WordGuessed,
    NoMoreGuesses,
}

/// Result of one accepted guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuessResult {
    Correct,
    Incorrect,
    WordGuessed,
    NoMoreGuesses,
}

fn instance_id() -> u64 {
    rand::rng().random()
}

/// The entire state of one Hangman round.
///
/// Never mutated after construction. Equality compares content only; use
/// [`same_instance`](Self::same_instance) to ask whether two snapshots
/// belong to the same round on this device.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HangmanSnapshot {
    word: String,
    guessed_letters: BTreeSet<char>,
    incorrect_letters: BTreeSet<char>,
    #[serde(rename = "pickerData")]
    picker: PeerId,
    #[serde(rename = "guesserData")]
    guesser: PeerId,
    #[serde(skip, default = "instance_id")]
    instance: u64,
}

impl PartialEq for HangmanSnapshot {
    fn eq(&self, other: &Self) -> bool {
        self.word == other.word
            && self.guessed_letters == other.guessed_letters
            && self.incorrect_letters == other.incorrect_letters
            && self.picker == other.picker
            && self.guesser == other.guesser
    }
}

impl Eq for HangmanSnapshot {}

impl HangmanSnapshot {
    /// A fresh round. `word` is trimmed and uppercased.
    pub fn new(word: &str, picker: PeerId, guesser: PeerId) -> Self {
        Self {
            word: word.trim().to_ascii_uppercase(),
            guessed_letters: BTreeSet::new(),
            incorrect_letters: BTreeSet::new(),
            picker,
            guesser,
            instance: instance_id(),
        }
    }

    /// The secret word, uppercased.
    pub fn word(&self) -> &str {
        &self.word
    }

    /// Correctly guessed letters.
    pub fn guessed_letters(&self) -> &BTreeSet<char> {
        &self.guessed_letters
    }

    /// Wrongly guessed letters.
    pub fn incorrect_letters(&self) -> &BTreeSet<char> {
        &self.incorrect_letters
    }

    pub fn picker(&self) -> PeerId {
        self.picker
    }

    pub fn guesser(&self) -> PeerId {
        self.guesser
    }

    /// Wrong guesses left before [`HangmanState::NoMoreGuesses`].
    pub fn guesses_remaining(&self) -> usize {
        GUESS_BUDGET.saturating_sub(self.incorrect_letters.len())
    }

    /// The distinct letters that have to be found.
    pub fn target_letters(&self) -> BTreeSet<char> {
        self.word
            .chars()
            .filter(char::is_ascii_alphabetic)
            .map(|ch| ch.to_ascii_uppercase())
            .collect()
    }

    /// Whether `letter` was already guessed, right or wrong.
    pub fn has_guessed(&self, letter: char) -> bool {
        self.guessed_letters.contains(&letter) || self.incorrect_letters.contains(&letter)
    }

    /// The word as guessers see it.
    pub fn obfuscated(&self) -> Obfuscated {
        obfuscate(&self.word, &self.guessed_letters)
    }

    pub fn state(&self) -> HangmanState {
        if self.obfuscated().text == self.word {
            HangmanState::WordGuessed
        } else if self.incorrect_letters.len() >= GUESS_BUDGET {
            HangmanState::NoMoreGuesses
        } else {
            HangmanState::InProgress
        }
    }

    /// Whether both snapshots belong to the same round on this device.
    pub fn same_instance(&self, other: &Self) -> bool {
        self.instance == other.instance
    }

    /// The snapshot after guessing `letter`, with the turn passed to
    /// `next_guesser`.
    fn with_guess(&self, letter: char, next_guesser: PeerId) -> Self {
        let mut next = self.clone();
        if self.target_letters().contains(&letter) {
            next.guessed_letters.insert(letter);
        } else {
            next.incorrect_letters.insert(letter);
        }
        next.guesser = next_guesser;
        next
    }

    fn with_guesser(&self, guesser: PeerId) -> Self {
        Self {
            guesser,
            ..self.clone()
        }
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Presentation events from a Hangman round.
#[derive(Debug, Clone, PartialEq)]
pub enum HangmanEvent {
    /// A new snapshot is in effect.
    StateChanged {
        snapshot: Arc<HangmanSnapshot>,
        display: Obfuscated,
    },
    /// The round reached a terminal state.
    Concluded { state: HangmanState, word: String },
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// A running Hangman round on this device.
#[derive(Debug, Clone)]
pub struct Hangman {
    snapshot: Arc<HangmanSnapshot>,
}

impl Hangman {
    /// Starts a round where `picker` chose `word`.
    ///
    /// The first guesser is the peer after the picker.
    ///
    /// # Errors
    /// - `GameError::InvalidChoice` if the word is too short or too long.
    /// - `GameError::NotEnoughPeers` if nobody else is around to guess.
    pub fn start(word: &str, picker: PeerId, turn: &TurnOrder) -> Result<Self, GameError> {
        match check_valid_choice(word) {
            WordChoice::Good => {}
            rejected => return Err(GameError::InvalidChoice(rejected)),
        }
        let guesser = turn
            .next_after_excluding(picker, picker)
            .map_err(|_| GameError::NotEnoughPeers)?;

        tracing::info!(%picker, %guesser, "hangman round started");
        Ok(Self::from_snapshot(HangmanSnapshot::new(word, picker, guesser)))
    }

    /// Wraps a snapshot received from a peer.
    pub fn from_snapshot(snapshot: HangmanSnapshot) -> Self {
        Self {
            snapshot: Arc::new(snapshot),
        }
    }

    /// Decodes a full-state payload as carried by `setGame`.
    pub fn decode<C: Codec>(codec: &C, payload: &[u8]) -> Result<Self, ProtocolError> {
        codec.decode(payload).map(Self::from_snapshot)
    }

    pub fn snapshot(&self) -> &Arc<HangmanSnapshot> {
        &self.snapshot
    }

    pub fn state(&self) -> HangmanState {
        self.snapshot.state()
    }

    /// Guesses a letter from raw user input.
    ///
    /// On success the new snapshot has been broadcast and applied.
    ///
    /// # Errors
    /// - `GameError::GameOver` once the round is terminal.
    /// - `GameError::NotYourTurn` unless the local peer is the guesser.
    /// - `GameError::InvalidGuess` if the input fails validation.
    pub fn make_guess<C: Codec>(
        &mut self,
        raw: &str,
        ctx: &mut GameContext<'_, C>,
    ) -> Result<GuessResult, GameError> {
        if self.state() != HangmanState::InProgress {
            return Err(GameError::GameOver);
        }
        let guesser = self.snapshot.guesser;
        if ctx.local() != guesser {
            return Err(GameError::NotYourTurn { expected: guesser });
        }
        let letter = sanitize_guess(raw, &self.snapshot).map_err(GameError::InvalidGuess)?;
        let next_guesser = next_turn(ctx.turn(), guesser, self.snapshot.picker)?;

        let next = self.snapshot.with_guess(letter, next_guesser);
        let result = match next.state() {
            HangmanState::WordGuessed => GuessResult::WordGuessed,
            HangmanState::NoMoreGuesses => GuessResult::NoMoreGuesses,
            HangmanState::InProgress if next.guessed_letters.contains(&letter) => {
                GuessResult::Correct
            }
            HangmanState::InProgress => GuessResult::Incorrect,
        };
        tracing::debug!(%letter, ?result, %next_guesser, "hangman guess");

        self.broadcast(next, ctx)?;
        Ok(result)
    }

    /// Replaces the local state with `snapshot` and notifies the UI.
    pub fn apply_inbound<C: Codec>(&mut self, snapshot: HangmanSnapshot, ctx: &mut GameContext<'_, C>) {
        self.snapshot = Arc::new(snapshot);

        ctx.notify(self.state_event());
        let state = self.state();
        if state != HangmanState::InProgress {
            tracing::info!(?state, "hangman round concluded");
            ctx.notify(GameEvent::Hangman(HangmanEvent::Concluded {
                state,
                word: self.snapshot.word.clone(),
            }));
        }
    }

    fn broadcast<C: Codec>(
        &mut self,
        next: HangmanSnapshot,
        ctx: &mut GameContext<'_, C>,
    ) -> Result<(), GameError> {
        let state = ctx.codec().encode(&next)?;
        ctx.send_game_command(&GameCommand::SetState(state))?;
        self.apply_inbound(next, ctx);
        Ok(())
    }
}

impl GameStateChannel for Hangman {
    fn kind(&self) -> GameKind {
        GameKind::Hangman
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
        let mut snapshot: HangmanSnapshot = ctx.codec().decode(&state)?;
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
            GameAction::Guess(raw) => self.make_guess(&raw, ctx).map(ActionOutcome::Guess),
            other => Err(GameError::WrongGame {
                action: other.name(),
                game: GameKind::Hangman,
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
        if lost.contains(&self.snapshot.guesser) && turn.first(&[picker]).is_err() {
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
                kind: GameKind::Hangman,
                reason,
            });
            return Ok(LossOutcome::Abandoned);
        }
        if self.is_finished() || !lost.contains(&self.snapshot.guesser) {
            return Ok(LossOutcome::Continues);
        }

        let guesser = ctx.turn().first(&[self.snapshot.picker])?;
        tracing::info!(lost = %self.snapshot.guesser, %guesser, "guesser left, passing turn");
        let next = self.snapshot.with_guesser(guesser);
        self.broadcast(next, ctx)?;
        Ok(LossOutcome::Continues)
    }

    fn state_event(&self) -> GameEvent {
        GameEvent::Hangman(HangmanEvent::StateChanged {
            snapshot: Arc::clone(&self.snapshot),
            display: self.snapshot.obfuscated(),
        })
    }

    fn is_finished(&self) -> bool {
        self.state() != HangmanState::InProgress
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use huddle_protocol::JsonCodec;

    fn pid(n: u64) -> PeerId {
        PeerId::new(n)
    }

    fn letters(s: &str) -> BTreeSet<char> {
        s.chars().collect()
    }

    /// Picker 1, guesser 2, local 2; just the two of them.
    fn two_player(word: &str) -> (Hangman, TurnOrder) {
        let turn = TurnOrder::new(pid(2), [pid(1)]);
        let game = Hangman::start(word, pid(1), &turn).unwrap();
        (game, turn)
    }

    fn guess(game: &mut Hangman, turn: &TurnOrder, raw: &str) -> Result<GuessResult, GameError> {
        let mut ctx = GameContext::new(turn.clone(), &JsonCodec);
        game.make_guess(raw, &mut ctx)
    }

    // =====================================================================
    // sanitize_guess
    // =====================================================================

    #[test]
    fn test_sanitize_guess_lowercase_letter_is_uppercased() {
        let snap = HangmanSnapshot::new("CAT", pid(1), pid(2));
        assert_eq!(sanitize_guess(" c ", &snap), Ok('C'));
    }

    #[test]
    fn test_sanitize_guess_rejections() {
        let snap = HangmanSnapshot::new("CAT", pid(1), pid(2));
        assert_eq!(sanitize_guess("", &snap), Err(GuessRejection::TooShort));
        assert_eq!(sanitize_guess("   ", &snap), Err(GuessRejection::TooShort));
        assert_eq!(sanitize_guess("cat", &snap), Err(GuessRejection::TooLong));
        assert_eq!(sanitize_guess("5", &snap), Err(GuessRejection::InvalidCharacter));
        assert_eq!(sanitize_guess("é", &snap), Err(GuessRejection::InvalidCharacter));
    }

    #[test]
    fn test_sanitize_guess_repeat_is_already_guessed() {
        let snap = HangmanSnapshot::new("CAT", pid(1), pid(2)).with_guess('C', pid(2));
        let snap = snap.with_guess('Z', pid(2));
        assert_eq!(sanitize_guess("c", &snap), Err(GuessRejection::AlreadyGuessed));
        assert_eq!(sanitize_guess("Z", &snap), Err(GuessRejection::AlreadyGuessed));
    }

    // =====================================================================
    // obfuscate / check_valid_choice
    // =====================================================================

    #[test]
    fn test_obfuscate_hides_unrevealed_letters() {
        let shown = obfuscate("CAT", &letters("A"));
        assert_eq!(shown.text, "_A_");
        assert_eq!(shown.blanks, 2);
    }

    #[test]
    fn test_obfuscate_always_shows_non_letters() {
        let shown = obfuscate("NO-GO 2 CAFÉ", &BTreeSet::new());
        assert_eq!(shown.text, "__-__ 2 ___É");
        assert_eq!(shown.blanks, 7);
    }

    #[test]
    fn test_check_valid_choice_counts_letters_only() {
        assert_eq!(check_valid_choice("A-B"), WordChoice::TooShort);
        assert_eq!(check_valid_choice("A B C"), WordChoice::Good);
        assert_eq!(check_valid_choice(&"A".repeat(101)), WordChoice::TooLong);
        assert_eq!(check_valid_choice(&"A".repeat(100)), WordChoice::Good);
    }

    // =====================================================================
    // Starting
    // =====================================================================

    #[test]
    fn test_start_first_guesser_follows_picker() {
        let turn = TurnOrder::new(pid(1), [pid(2), pid(3)]);
        let game = Hangman::start("cat", pid(1), &turn).unwrap();
        assert_eq!(game.snapshot().guesser(), pid(2));
        assert_eq!(game.snapshot().word(), "CAT");
    }

    #[test]
    fn test_start_alone_is_not_enough_peers() {
        let turn = TurnOrder::new(pid(1), []);
        let result = Hangman::start("cat", pid(1), &turn);
        assert!(matches!(result, Err(GameError::NotEnoughPeers)));
    }

    #[test]
    fn test_start_short_word_is_invalid_choice() {
        let turn = TurnOrder::new(pid(1), [pid(2)]);
        let result = Hangman::start("ox", pid(1), &turn);
        assert!(matches!(result, Err(GameError::InvalidChoice(WordChoice::TooShort))));
    }

    // =====================================================================
    // Guessing
    // =====================================================================

    #[test]
    fn test_make_guess_cat_correct_correct_word_guessed() {
        let (mut game, turn) = two_player("CAT");

        assert_eq!(guess(&mut game, &turn, "C").unwrap(), GuessResult::Correct);
        assert_eq!(guess(&mut game, &turn, "A").unwrap(), GuessResult::Correct);
        assert_eq!(guess(&mut game, &turn, "T").unwrap(), GuessResult::WordGuessed);

        assert_eq!(game.snapshot().obfuscated().blanks, 0);
        assert!(game.is_finished());
    }

    #[test]
    fn test_make_guess_dog_budget_exhausted_then_game_over() {
        let (mut game, turn) = two_player("DOG");
        let wrong = ["A", "B", "C", "E", "F", "H", "I", "J", "K"];
        assert_eq!(wrong.len(), GUESS_BUDGET);

        for letter in &wrong[..GUESS_BUDGET - 1] {
            assert_eq!(guess(&mut game, &turn, letter).unwrap(), GuessResult::Incorrect);
        }
        assert_eq!(
            guess(&mut game, &turn, wrong[GUESS_BUDGET - 1]).unwrap(),
            GuessResult::NoMoreGuesses
        );
        assert!(matches!(guess(&mut game, &turn, "D"), Err(GameError::GameOver)));
    }

    #[test]
    fn test_make_guess_broadcasts_one_set_state() {
        let (mut game, turn) = two_player("CAT");
        let mut ctx = GameContext::new(turn, &JsonCodec);

        game.make_guess("c", &mut ctx).unwrap();

        let (outbound, events) = ctx.into_parts();
        assert_eq!(outbound.len(), 1);
        let state = decode_set_state(&JsonCodec, &outbound[0]).unwrap();
        let sent: HangmanSnapshot = JsonCodec.decode(&state).unwrap();
        assert_eq!(&sent, &**game.snapshot());
        assert!(matches!(events[0], GameEvent::Hangman(HangmanEvent::StateChanged { .. })));
    }

    #[test]
    fn test_make_guess_rotates_past_picker() {
        // Picker 1; guessers 2 and 3. Local is 2.
        let turn = TurnOrder::new(pid(2), [pid(1), pid(3)]);
        let mut game = Hangman::start("cat", pid(1), &turn).unwrap();

        guess(&mut game, &turn, "z").unwrap();
        assert_eq!(game.snapshot().guesser(), pid(3));
    }

    #[test]
    fn test_make_guess_out_of_turn_is_rejected_without_traffic() {
        let turn = TurnOrder::new(pid(3), [pid(1), pid(2)]);
        let mut game = Hangman::start("cat", pid(1), &turn).unwrap();
        let mut ctx = GameContext::new(turn, &JsonCodec);

        let result = game.make_guess("c", &mut ctx);

        assert!(matches!(result, Err(GameError::NotYourTurn { expected }) if expected == pid(2)));
        assert!(ctx.outbound().is_empty());
        assert!(ctx.events().is_empty());
    }

    #[test]
    fn test_make_guess_invalid_input_changes_nothing() {
        let (mut game, turn) = two_player("CAT");
        let before = Arc::clone(game.snapshot());

        let result = guess(&mut game, &turn, "cat");

        assert!(matches!(result, Err(GameError::InvalidGuess(GuessRejection::TooLong))));
        assert!(Arc::ptr_eq(&before, game.snapshot()));
    }

    #[test]
    fn test_perform_question_action_is_wrong_game() {
        let (mut game, turn) = two_player("CAT");
        let mut ctx = GameContext::new(turn, &JsonCodec);
        let result = game.perform(GameAction::Ask("is it big?".into()), &mut ctx);
        assert!(matches!(result, Err(GameError::WrongGame { .. })));
    }

    // =====================================================================
    // Inbound snapshots
    // =====================================================================

    #[test]
    fn test_snapshot_json_field_names() {
        let snap = HangmanSnapshot::new("CAT", pid(1), pid(2)).with_guess('C', pid(2));
        let json = serde_json::to_value(&snap).unwrap();

        assert_eq!(json["word"], "CAT");
        assert_eq!(json["guessedLetters"], serde_json::json!(["C"]));
        assert_eq!(json["incorrectLetters"], serde_json::json!([]));
        assert_eq!(json["pickerData"], serde_json::json!([0, 0, 0, 0, 0, 0, 0, 1]));
        assert_eq!(json["guesserData"], serde_json::json!([0, 0, 0, 0, 0, 0, 0, 2]));
        assert!(json.get("instance").is_none());
    }

    #[test]
    fn test_snapshot_decode_reencode_is_idempotent() {
        let snap = HangmanSnapshot::new("A CAT!", pid(1), pid(2))
            .with_guess('C', pid(2))
            .with_guess('Q', pid(2));
        let bytes = JsonCodec.encode(&snap).unwrap();
        let decoded: HangmanSnapshot = JsonCodec.decode(&bytes).unwrap();

        assert_eq!(decoded, snap);
        assert_eq!(JsonCodec.encode(&decoded).unwrap(), bytes);
        assert!(!decoded.same_instance(&snap));
    }

    #[test]
    fn test_apply_payload_replaces_state_and_keeps_instance() {
        let (mut game, turn) = two_player("CAT");
        let remote = game.snapshot().with_guess('A', pid(2));
        let state = JsonCodec.encode(&remote).unwrap();
        let payload = JsonCodec.encode(&GameCommand::SetState(state)).unwrap();
        let before = Arc::clone(game.snapshot());

        let mut ctx = GameContext::new(turn, &JsonCodec);
        game.apply_payload(&payload, &mut ctx).unwrap();

        assert_eq!(&**game.snapshot(), &remote);
        assert!(game.snapshot().same_instance(&before));
        assert!(ctx.outbound().is_empty());
    }

    #[test]
    fn test_apply_payload_terminal_snapshot_emits_concluded() {
        let (mut game, turn) = two_player("CAT");
        let remote = game
            .snapshot()
            .with_guess('C', pid(2))
            .with_guess('A', pid(2))
            .with_guess('T', pid(2));
        let payload = JsonCodec
            .encode(&GameCommand::SetState(JsonCodec.encode(&remote).unwrap()))
            .unwrap();

        let mut ctx = GameContext::new(turn, &JsonCodec);
        game.apply_payload(&payload, &mut ctx).unwrap();

        assert_eq!(
            ctx.events().last(),
            Some(&GameEvent::Hangman(HangmanEvent::Concluded {
                state: HangmanState::WordGuessed,
                word: "CAT".into()
            }))
        );
    }

    #[test]
    fn test_apply_payload_garbage_keeps_state() {
        let (mut game, turn) = two_player("CAT");
        let before = Arc::clone(game.snapshot());
        let mut ctx = GameContext::new(turn, &JsonCodec);

        let result = game.apply_payload(b"garbage", &mut ctx);

        assert!(matches!(result, Err(GameError::Protocol(_))));
        assert!(Arc::ptr_eq(&before, game.snapshot()));
    }

    // =====================================================================
    // Lost peers
    // =====================================================================

    #[test]
    fn test_lost_picker_abandons() {
        let (mut game, turn) = two_player("CAT");
        let mut ctx = GameContext::new(turn, &JsonCodec);

        let outcome = game.handle_lost_peers(&[pid(1)], &mut ctx).unwrap();

        assert_eq!(outcome, LossOutcome::Abandoned);
        assert_eq!(
            ctx.events(),
            &[GameEvent::Abandoned {
                kind: GameKind::Hangman,
                reason: AbandonReason::PickerLost(pid(1))
            }]
        );
    }

    #[test]
    fn test_lost_guesser_passes_turn_to_first_non_picker() {
        // Picker 1, guesser 2, local picker. 2 leaves; 3 and 4 remain.
        let full = TurnOrder::new(pid(1), [pid(2), pid(3), pid(4)]);
        let mut game = Hangman::start("cat", pid(1), &full).unwrap();
        assert_eq!(game.snapshot().guesser(), pid(2));

        let after = TurnOrder::new(pid(1), [pid(3), pid(4)]);
        let mut ctx = GameContext::new(after, &JsonCodec);
        let outcome = game.handle_lost_peers(&[pid(2)], &mut ctx).unwrap();

        assert_eq!(outcome, LossOutcome::Continues);
        assert_eq!(game.snapshot().guesser(), pid(3));
        assert_eq!(ctx.outbound().len(), 1);
    }

    #[test]
    fn test_lost_last_guesser_abandons() {
        let full = TurnOrder::new(pid(1), [pid(2)]);
        let mut game = Hangman::start("cat", pid(1), &full).unwrap();

        let mut ctx = GameContext::new(TurnOrder::new(pid(1), []), &JsonCodec);
        let outcome = game.handle_lost_peers(&[pid(2)], &mut ctx).unwrap();

        assert_eq!(outcome, LossOutcome::Abandoned);
    }

    #[test]
    fn test_lost_bystander_changes_nothing() {
        let full = TurnOrder::new(pid(1), [pid(2), pid(3)]);
        let mut game = Hangman::start("cat", pid(1), &full).unwrap();

        let mut ctx = GameContext::new(TurnOrder::new(pid(1), [pid(2)]), &JsonCodec);
        let outcome = game.handle_lost_peers(&[pid(3)], &mut ctx).unwrap();

        assert_eq!(outcome, LossOutcome::Continues);
        assert!(ctx.outbound().is_empty());
    }

    #[test]
    fn test_abandon_reason_on_guesser_replica_leaves_state() {
        // Seen from guesser 2 after picker 1 drops.
        let full = TurnOrder::new(pid(2), [pid(1), pid(3)]);
        let game = Hangman::start("cat", pid(1), &full).unwrap();
        let before = Arc::clone(game.snapshot());

        let after = TurnOrder::new(pid(2), [pid(3)]);
        assert_eq!(
            game.abandon_reason(&[pid(1)], &after),
            Some(AbandonReason::PickerLost(pid(1)))
        );
        assert_eq!(game.abandon_reason(&[pid(3)], &after), None);
        assert!(Arc::ptr_eq(&before, game.snapshot()));
    }
}
