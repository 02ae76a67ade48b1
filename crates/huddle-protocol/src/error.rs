//! Error types for the protocol layer.
//!
//! A `ProtocolError` always means the bytes themselves were the problem.
//! A well-formed envelope that simply isn't expected right now (say, game
//! data with no game running) is not an error here; the coordinator
//! decides what to do with it.

/// Errors that can occur while encoding or decoding commands.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed bytes, missing fields, wrong types.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The bytes are a well-formed envelope whose `command` tag this
    /// build does not know. Usually a peer running a newer version.
    #[error("unknown command {0:?}")]
    UnknownCommand(String),
}
