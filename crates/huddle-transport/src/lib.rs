//! Transport abstraction layer for Huddle.
//!
//! A Huddle session has no server. Every device is a peer, and the
//! [`Transport`] trait is the only thing the coordination layer knows
//! about the network: it can start advertising, send bytes to a set of
//! peers, and report peer-state changes and received bytes as
//! [`TransportEvent`]s.
//!
//! # Feature Flags
//!
//! - `memory` (default) — [`MemoryHub`], an in-process mesh for tests
//!   and local demos
//! - `websocket` (default) — [`WebSocketMesh`], peer links over
//!   WebSocket via `tokio-tungstenite`

mod error;
#[cfg(feature = "memory")]
mod memory;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "memory")]
pub use memory::{MemoryHub, MemoryTransport};
#[cfg(feature = "websocket")]
pub use websocket::{MeshDialer, WebSocketMesh};

use std::fmt;
use std::future::Future;

use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ---------------------------------------------------------------------------
// PeerId
// ---------------------------------------------------------------------------

/// Opaque identifier for one device for the lifetime of a session.
///
/// The derived `Ord` is the session-wide total order: every peer sorts
/// the same set of ids the same way without talking to anyone, which is
/// what turn order and host migration are built on.
///
/// On the wire a `PeerId` is its 8-byte big-endian representation
/// (`hostPeerIDData`, `pickerData`, ...), so it serializes as a byte
/// sequence rather than a number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeerId(u64);

impl PeerId {
    /// Length of the byte representation.
    pub const BYTE_LEN: usize = 8;

    /// Creates a `PeerId` from a raw key.
    pub fn new(key: u64) -> Self {
        Self(key)
    }

    /// Generates a fresh random id for this device.
    pub fn random() -> Self {
        Self(rand::rng().random())
    }

    /// Returns the underlying key.
    pub fn key(self) -> u64 {
        self.0
    }

    /// Byte representation used inside payloads.
    pub fn to_bytes(self) -> [u8; Self::BYTE_LEN] {
        self.0.to_be_bytes()
    }

    /// Parses the byte representation. Returns `None` unless `bytes` is
    /// exactly [`Self::BYTE_LEN`] long.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let raw: [u8; Self::BYTE_LEN] = bytes.try_into().ok()?;
        Some(Self(u64::from_be_bytes(raw)))
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer-{:016x}", self.0)
    }
}

impl Serialize for PeerId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_bytes().as_slice().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PeerId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bytes: Vec<u8> = Deserialize::deserialize(deserializer)?;
        Self::from_bytes(&bytes)
            .ok_or_else(|| serde::de::Error::custom("peer id must be exactly 8 bytes"))
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Link state of a remote peer as seen from this device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    /// A link is being negotiated.
    Connecting,
    /// The link is up; bytes can flow both ways.
    Connected,
    /// The link is gone (or never came up).
    NotConnected,
}

impl fmt::Display for PeerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::NotConnected => write!(f, "not connected"),
        }
    }
}

/// Something the transport observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A peer's link state changed.
    PeerChanged { peer: PeerId, state: PeerState },
    /// A peer sent us bytes.
    Received { from: PeerId, data: Vec<u8> },
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// The peer-to-peer delivery capability the coordinator is built on.
///
/// Delivery is reliable and ordered per sender. There is no ordering
/// across senders and no application-level acknowledgement.
///
/// The futures are `Send` so a coordinator generic over `T: Transport`
/// can be moved into `tokio::spawn`.
pub trait Transport: Send + 'static {
    /// This device's identity.
    fn local_peer(&self) -> PeerId;

    /// Begins advertising/accepting links.
    fn start(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Stops accepting new links. Existing links stay up.
    fn stop_advertising(&mut self);

    /// Sends `data` to every peer in `to`.
    ///
    /// Every recipient is attempted even if an earlier one fails; the
    /// first failure is returned.
    fn send(
        &mut self,
        data: &[u8],
        to: &[PeerId],
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Waits for the next event. `None` means the transport is gone for good.
    fn next_event(&mut self) -> impl Future<Output = Option<TransportEvent>> + Send;

    /// Tears down every link and stops advertising.
    fn shutdown(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_id_bytes_round_trip() {
        let id = PeerId::new(0x0102_0304_0506_0708);
        assert_eq!(id.to_bytes(), [1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(PeerId::from_bytes(&id.to_bytes()), Some(id));
    }

    #[test]
    fn test_peer_id_from_bytes_wrong_length_returns_none() {
        assert_eq!(PeerId::from_bytes(&[1, 2, 3]), None);
        assert_eq!(PeerId::from_bytes(&[0; 9]), None);
    }

    #[test]
    fn test_peer_id_display() {
        assert_eq!(PeerId::new(255).to_string(), "peer-00000000000000ff");
    }

    #[test]
    fn test_peer_id_order_follows_key() {
        let mut ids = vec![PeerId::new(30), PeerId::new(10), PeerId::new(20)];
        ids.sort();
        assert_eq!(ids, vec![PeerId::new(10), PeerId::new(20), PeerId::new(30)]);
    }

    #[test]
    fn test_peer_id_serializes_as_byte_array() {
        let json = serde_json::to_string(&PeerId::new(1)).unwrap();
        assert_eq!(json, "[0,0,0,0,0,0,0,1]");

        let back: PeerId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, PeerId::new(1));
    }

    #[test]
    fn test_peer_id_deserialize_short_array_fails() {
        let result: Result<PeerId, _> = serde_json::from_str("[1,2]");
        assert!(result.is_err());
    }

    #[test]
    fn test_peer_id_random_ids_differ() {
        // 64 random bits; a collision here means the generator is broken.
        assert_ne!(PeerId::random(), PeerId::random());
    }
}
