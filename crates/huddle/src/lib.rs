//! # Huddle
//!
//! Peer session coordination for ad-hoc mesh word games.
//!
//! Devices link with each other directly (no server), agree on a host
//! and a turn order without voting, and keep one game in sync by
//! broadcasting whole immutable snapshots.
//!
//! ## Layers
//!
//! ```text
//! huddle (this crate)   PeerSessionCoordinator, CoordinatorHandle, SessionEvent
//!   ├─ huddle-games     GameStateChannel, Hangman, TwentyQuestions
//!   ├─ huddle-debounce  Debouncer (batched disconnects)
//!   ├─ huddle-session   PeerRoster, TurnOrder
//!   ├─ huddle-protocol  CommandEnvelope, Codec
//!   └─ huddle-transport Transport, MemoryHub, WebSocketMesh
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use huddle::prelude::*;
//!
//! # async fn demo() -> Result<(), HuddleError> {
//! let hub = MemoryHub::new();
//! let (coordinator, mut events) = PeerSessionCoordinator::new(
//!     hub.join(PeerId::random()),
//!     JsonCodec,
//!     CoordinatorConfig::default(),
//! );
//! let handle = coordinator.spawn();
//! handle.start().await?;
//! while let Some(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! # Ok(())
//! # }
//! ```

mod config;
mod coordinator;
mod error;
mod event;
mod handle;

pub use config::{CoordinatorConfig, SessionRole};
pub use coordinator::{PeerSessionCoordinator, SessionInfo};
pub use error::HuddleError;
pub use event::SessionEvent;
pub use handle::CoordinatorHandle;

pub use huddle_debounce as debounce;
pub use huddle_games as games;
pub use huddle_protocol as protocol;
pub use huddle_session as session;
pub use huddle_transport as transport;

use tracing_subscriber::EnvFilter;

/// Installs a `tracing` fmt subscriber filtered by `RUST_LOG`
/// (default `info`).
///
/// Does nothing if a global subscriber is already set.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// Everything an application usually needs.
pub mod prelude {
    pub use crate::{
        CoordinatorConfig, CoordinatorHandle, HuddleError, PeerSessionCoordinator, SessionEvent,
        SessionInfo, SessionRole, init_tracing,
    };
    pub use huddle_games::{
        ActionOutcome, Answer, GameAction, GameEvent, GameSetup, GuessResult, HangmanEvent,
        QuestionsEvent,
    };
    pub use huddle_protocol::{Codec, GameKind, JsonCodec};
    pub use huddle_transport::{MemoryHub, PeerId, PeerState, Transport, WebSocketMesh};
}
