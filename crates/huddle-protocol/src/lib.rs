//! Wire protocol for Huddle.
//!
//! This crate defines what peers say to each other:
//!
//! - **Envelope** ([`CommandEnvelope`], [`GameKind`]) — the tagged
//!   command every message is wrapped in.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how commands and game
//!   payloads are converted to/from bytes.
//! - **Errors** ([`ProtocolError`]) — what can go wrong during
//!   encoding/decoding.
//!
//! # Architecture
//!
//! ```text
//! Transport (bytes) → Protocol (CommandEnvelope) → Coordinator (routing)
//!                                                      └→ game module (inner payload)
//! ```

mod codec;
mod envelope;
mod error;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use envelope::{CommandEnvelope, GameKind, decode_envelope, encode_envelope};
pub use error::ProtocolError;

pub use huddle_transport::PeerId;
