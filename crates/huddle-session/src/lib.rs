//! Peer bookkeeping for Huddle sessions.
//!
//! This crate answers two questions every peer has to answer the same
//! way without asking anyone else:
//!
//! 1. **Who is here?** — [`PeerRoster`], the connected peers plus the
//!    local device.
//! 2. **Whose turn is next?** — [`TurnOrder`], a deterministic order
//!    derived from the roster.
//!
//! # How it fits in the stack
//!
//! ```text
//! Coordinator (above)  ← mutates the roster on transport events
//!     ↕
//! Session Layer (this crate)  ← roster + turn order, pure and synchronous
//!     ↕
//! Transport (below)  ← provides PeerId and its total order
//! ```

mod error;
mod roster;
mod turn_order;

pub use error::TurnOrderError;
pub use roster::PeerRoster;
pub use turn_order::TurnOrder;
