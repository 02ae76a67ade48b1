use crate::PeerId;

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The link to a peer was closed.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// The peer has no live link from this device.
    ///
    /// Raised when sending to a peer that disconnected (or never
    /// connected). Every other recipient of the same send is still
    /// attempted.
    #[error("peer {0} is not reachable")]
    PeerUnreachable(PeerId),

    /// Binding or accepting links failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// The peer-identity hello exchange failed.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// The transport was shut down.
    #[error("transport shut down")]
    Shutdown,
}
