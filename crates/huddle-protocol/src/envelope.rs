//! The command envelope: the only message shape peers exchange.
//!
//! Every payload a peer sends is one [`CommandEnvelope`]. The coordinator
//! routes on the `command` tag; game data stays opaque bytes at this
//! layer and is decoded later by whichever game module owns it.
//!
//! ```text
//! { "command": "setGame",  "game": "hangman", "payload": [..] }
//! { "command": "gameData", "payload": [..] }
//! { "command": "status",   "message": "..." }
//! { "command": "setHost",  "hostPeerIDData": [..8 bytes..] }
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use huddle_transport::PeerId;

use crate::{Codec, ProtocolError};

// ---------------------------------------------------------------------------
// GameKind
// ---------------------------------------------------------------------------

/// Which game module a `setGame` command is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GameKind {
    Hangman,
    TwentyQuestions,
}

impl fmt::Display for GameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hangman => write!(f, "hangman"),
            Self::TwentyQuestions => write!(f, "twenty questions"),
        }
    }
}

// ---------------------------------------------------------------------------
// CommandEnvelope
// ---------------------------------------------------------------------------

/// The top-level wire command.
///
/// `#[serde(tag = "command")]` makes this internally tagged, so the
/// discriminant sits next to the fields instead of wrapping them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum CommandEnvelope {
    /// Switches the receiver to a game and hands it the full state.
    SetGame { game: GameKind, payload: Vec<u8> },

    /// An update for the game already running. The payload is the game
    /// module's own inner command.
    GameData { payload: Vec<u8> },

    /// Free-form status text from a peer.
    Status { message: String },

    /// Announces who the session host is.
    SetHost {
        #[serde(rename = "hostPeerIDData")]
        host: PeerId,
    },
}

impl CommandEnvelope {
    /// Every `command` tag this build understands.
    pub const KNOWN_COMMANDS: [&'static str; 4] = ["setGame", "gameData", "status", "setHost"];

    /// The wire tag of this command, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetGame { .. } => "setGame",
            Self::GameData { .. } => "gameData",
            Self::Status { .. } => "status",
            Self::SetHost { .. } => "setHost",
        }
    }
}

/// Just the discriminant, used to tell "unknown command" apart from
/// "garbage" when a full decode fails.
#[derive(Deserialize)]
struct CommandTag {
    command: String,
}

/// Encodes an envelope with `codec`.
pub fn encode_envelope<C: Codec>(
    codec: &C,
    envelope: &CommandEnvelope,
) -> Result<Vec<u8>, ProtocolError> {
    codec.encode(envelope)
}

/// Decodes an envelope with `codec`.
///
/// # Errors
/// - `ProtocolError::UnknownCommand` if the bytes carry a `command` tag
///   that isn't one of [`CommandEnvelope::KNOWN_COMMANDS`].
/// - The codec's decode error for anything else malformed, including a
///   known tag with bad fields.
pub fn decode_envelope<C: Codec>(codec: &C, data: &[u8]) -> Result<CommandEnvelope, ProtocolError> {
    match codec.decode::<CommandEnvelope>(data) {
        Ok(envelope) => Ok(envelope),
        Err(err) => match codec.decode::<CommandTag>(data) {
            Ok(tag) if !CommandEnvelope::KNOWN_COMMANDS.contains(&tag.command.as_str()) => {
                Err(ProtocolError::UnknownCommand(tag.command))
            }
            _ => Err(err),
        },
    }
}

// =========================================================================
// Tests
// =========================================================================
