//! In-process mesh transport.
//!
//! A [`MemoryHub`] plays the role of the radio: peers [`join`](MemoryHub::join)
//! it, and the test (or demo) decides who links with whom by calling
//! [`connect`](MemoryHub::connect), [`disconnect`](MemoryHub::disconnect)
//! and [`drop_peer`](MemoryHub::drop_peer). Each call produces exactly the
//! [`TransportEvent`]s a real mesh would report on both ends, which makes
//! host migration and disconnect batching deterministic to test.
//!
//! ```text
//!   MemoryTransport(A) ──┐
//!   MemoryTransport(B) ──┼── MemoryHub (links: A↔B, B↔C)
//!   MemoryTransport(C) ──┘
//! ```

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

use crate::{PeerId, PeerState, Transport, TransportError, TransportEvent};

struct Node {
    events: mpsc::UnboundedSender<TransportEvent>,
    started: bool,
    advertising: bool,
    links: BTreeSet<PeerId>,
}

impl Node {
    fn emit(&self, event: TransportEvent) {
        // The receiving transport may already be dropped; nothing to do then.
        let _ = self.events.send(event);
    }
}

#[derive(Default)]
struct HubInner {
    nodes: HashMap<PeerId, Node>,
}

/// Shared in-memory "airspace" that [`MemoryTransport`]s attach to.
///
/// Cheap to clone; all clones see the same set of peers and links.
#[derive(Clone, Default)]
pub struct MemoryHub {
    inner: Arc<Mutex<HubInner>>,
}

impl MemoryHub {
    /// Creates an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HubInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers `peer` with the hub and returns its transport.
    ///
    /// Joining again with the same id replaces the earlier registration
    /// and drops its links.
    pub fn join(&self, peer: PeerId) -> MemoryTransport {
        self.drop_peer(peer);

        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().nodes.insert(
            peer,
            Node {
                events: tx,
                started: false,
                advertising: false,
                links: BTreeSet::new(),
            },
        );
        tracing::debug!(%peer, "peer joined memory hub");

        MemoryTransport {
            local: peer,
            hub: self.clone(),
            events: rx,
        }
    }

    /// Links `dialer` to `target`.
    ///
    /// Both peers must have started their transports, and `target` must
    /// still be advertising. Both ends observe `Connecting` followed by
    /// `Connected`. Linking an already linked pair is a no-op.
    pub fn connect(&self, dialer: PeerId, target: PeerId) -> Result<(), TransportError> {
        let mut inner = self.lock();

        let dialer_ready = inner.nodes.get(&dialer).is_some_and(|n| n.started);
        if !dialer_ready {
            return Err(TransportError::Shutdown);
        }
        let target_ready = inner
            .nodes
            .get(&target)
            .is_some_and(|n| n.started && n.advertising);
        if !target_ready || dialer == target {
            return Err(TransportError::PeerUnreachable(target));
        }
        Self::establish(&mut inner, dialer, target);
        Ok(())
    }

    /// Links two started peers whether or not either is advertising.
    ///
    /// This is how a mesh framework joins members of one session to each
    /// other once they have found it, independent of discovery.
    pub fn link(&self, a: PeerId, b: PeerId) -> Result<(), TransportError> {
        let mut inner = self.lock();
        for peer in [a, b] {
            if !inner.nodes.get(&peer).is_some_and(|n| n.started) || a == b {
                return Err(TransportError::PeerUnreachable(peer));
            }
        }
        Self::establish(&mut inner, a, b);
        Ok(())
    }

    fn establish(inner: &mut HubInner, dialer: PeerId, target: PeerId) {
        if inner.nodes[&dialer].links.contains(&target) {
            return;
        }

        for (me, other) in [(dialer, target), (target, dialer)] {
            if let Some(node) = inner.nodes.get_mut(&me) {
                node.links.insert(other);
                node.emit(TransportEvent::PeerChanged {
                    peer: other,
                    state: PeerState::Connecting,
                });
                node.emit(TransportEvent::PeerChanged {
                    peer: other,
                    state: PeerState::Connected,
                });
            }
        }
        tracing::debug!(%dialer, %target, "memory link up");
    }

    /// Tears down the link between `a` and `b`, if any.
    pub fn disconnect(&self, a: PeerId, b: PeerId) {
        let mut inner = self.lock();
        Self::unlink(&mut inner, a, b);
    }

    /// Removes `peer` from the hub entirely, as if the device vanished.
    ///
    /// Every linked peer observes `NotConnected`. The dropped peer's own
    /// transport sees its event stream end.
    pub fn drop_peer(&self, peer: PeerId) {
        let mut inner = self.lock();
        let links: Vec<PeerId> = match inner.nodes.get(&peer) {
            Some(node) => node.links.iter().copied().collect(),
            None => return,
        };
        for other in links {
            Self::unlink(&mut inner, peer, other);
        }
        inner.nodes.remove(&peer);
        tracing::debug!(%peer, "peer left memory hub");
    }

    /// Whether `peer` currently accepts new links.
    pub fn is_advertising(&self, peer: PeerId) -> bool {
        self.lock().nodes.get(&peer).is_some_and(|n| n.advertising)
    }

    /// The peers `peer` is currently linked with, ascending.
    pub fn links(&self, peer: PeerId) -> Vec<PeerId> {
        self.lock()
            .nodes
            .get(&peer)
            .map(|n| n.links.iter().copied().collect())
            .unwrap_or_default()
    }

    fn unlink(inner: &mut HubInner, a: PeerId, b: PeerId) {
        for (me, other) in [(a, b), (b, a)] {
            if let Some(node) = inner.nodes.get_mut(&me) {
                if node.links.remove(&other) {
                    node.emit(TransportEvent::PeerChanged {
                        peer: other,
                        state: PeerState::NotConnected,
                    });
                }
            }
        }
        tracing::debug!(%a, %b, "memory link down");
    }
}

/// One peer's view of a [`MemoryHub`].
pub struct MemoryTransport {
    local: PeerId,
    hub: MemoryHub,
    events: mpsc::UnboundedReceiver<TransportEvent>,
}

impl MemoryTransport {
    /// The hub this transport is attached to.
    pub fn hub(&self) -> &MemoryHub {
        &self.hub
    }
}

impl Transport for MemoryTransport {
    fn local_peer(&self) -> PeerId {
        self.local
    }

    async fn start(&mut self) -> Result<(), TransportError> {
        let mut inner = self.hub.lock();
        let node = inner
            .nodes
            .get_mut(&self.local)
            .ok_or(TransportError::Shutdown)?;
        node.started = true;
        node.advertising = true;
        Ok(())
    }

    fn stop_advertising(&mut self) {
        if let Some(node) = self.hub.lock().nodes.get_mut(&self.local) {
            node.advertising = false;
        }
    }

    async fn send(&mut self, data: &[u8], to: &[PeerId]) -> Result<(), TransportError> {
        let inner = self.hub.lock();
        let me = inner.nodes.get(&self.local).ok_or(TransportError::Shutdown)?;

        let mut first_error = None;
        for &peer in to {
            let target = inner.nodes.get(&peer).filter(|_| me.links.contains(&peer));
            match target {
                Some(node) => node.emit(TransportEvent::Received {
                    from: self.local,
                    data: data.to_vec(),
                }),
                None => {
                    tracing::trace!(from = %self.local, to = %peer, "memory send to unlinked peer");
                    first_error.get_or_insert(TransportError::PeerUnreachable(peer));
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    async fn next_event(&mut self) -> Option<TransportEvent> {
        self.events.recv().await
    }

    async fn shutdown(&mut self) -> Result<(), TransportError> {
        self.hub.drop_peer(self.local);
        Ok(())
    }
}
