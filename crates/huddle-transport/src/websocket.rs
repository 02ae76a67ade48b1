//! WebSocket mesh transport using `tokio-tungstenite`.
//!
//! Every peer binds a listener and can also dial other peers, so a
//! session of N devices is a set of point-to-point WebSocket links. Right
//! after the WebSocket handshake both ends send one binary frame holding
//! their 8-byte [`PeerId`]; after that every binary frame is delivered as
//! [`TransportEvent::Received`].
//!
//! Each link gets two tasks:
//!
//! ```text
//!   send() ──mpsc──▶ writer task ──▶ sink ══ socket ══ stream ──▶ reader task ──▶ events
//! ```
//!
//! Dropping a link's sender (on [`Transport::shutdown`]) ends its writer,
//! which closes the socket.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;

use crate::{PeerId, PeerState, Transport, TransportError, TransportEvent};

/// Counter for telling successive links to the same peer apart.
static NEXT_LINK_ID: AtomicU64 = AtomicU64::new(1);

/// Outgoing half of one live link.
struct Link {
    id: u64,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
}

/// State shared between the mesh, its dialers, and its link tasks.
struct Shared {
    local: PeerId,
    advertising: AtomicBool,
    links: Mutex<HashMap<PeerId, Link>>,
    events: mpsc::UnboundedSender<TransportEvent>,
}

impl Shared {
    fn links(&self) -> MutexGuard<'_, HashMap<PeerId, Link>> {
        self.links.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: TransportEvent) {
        let _ = self.events.send(event);
    }
}

/// A [`Transport`] that links peers over WebSocket.
pub struct WebSocketMesh {
    shared: Arc<Shared>,
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    events: mpsc::UnboundedReceiver<TransportEvent>,
    accept_task: Option<JoinHandle<()>>,
}

impl WebSocketMesh {
    /// Binds the mesh listener for `local` on `addr`.
    ///
    /// Nothing is accepted until [`Transport::start`] is called.
    pub async fn bind(local: PeerId, addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        let local_addr = listener.local_addr().map_err(TransportError::AcceptFailed)?;
        tracing::info!(peer = %local, %local_addr, "WebSocket mesh bound");

        let (tx, rx) = mpsc::unbounded_channel();
        Ok(Self {
            shared: Arc::new(Shared {
                local,
                advertising: AtomicBool::new(false),
                links: Mutex::new(HashMap::new()),
                events: tx,
            }),
            listener: Some(listener),
            local_addr,
            events: rx,
            accept_task: None,
        })
    }

    /// The address other peers should dial.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns a handle that can open outgoing links after the mesh has
    /// been moved into a coordinator.
    pub fn dialer(&self) -> MeshDialer {
        MeshDialer {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Opens a link to the peer listening on `addr` and returns its id.
    pub async fn dial(&self, addr: SocketAddr) -> Result<PeerId, TransportError> {
        self.dialer().dial(addr).await
    }
}

impl Drop for WebSocketMesh {
    fn drop(&mut self) {
        if let Some(task) = self.accept_task.take() {
            task.abort();
        }
    }
}

/// Cloneable handle for dialing out of a [`WebSocketMesh`].
#[derive(Clone)]
pub struct MeshDialer {
    shared: Arc<Shared>,
}

impl MeshDialer {
    /// Opens a link to the peer listening on `addr` and returns its id.
    ///
    /// Dialing a peer that is already linked keeps the existing link.
    pub async fn dial(&self, addr: SocketAddr) -> Result<PeerId, TransportError> {
        let url = format!("ws://{addr}");
        let (mut ws, _) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| TransportError::Handshake(e.to_string()))?;

        let peer = exchange_hello(self.shared.local, &mut ws).await?;
        tracing::debug!(local = %self.shared.local, %peer, %addr, "dialed peer");
        register(&self.shared, peer, ws);
        Ok(peer)
    }
}

impl Transport for WebSocketMesh {
    fn local_peer(&self) -> PeerId {
        self.shared.local
    }

    async fn start(&mut self) -> Result<(), TransportError> {
        self.shared.advertising.store(true, Ordering::SeqCst);

        let Some(listener) = self.listener.take() else {
            return Ok(());
        };
        let shared = Arc::clone(&self.shared);
        self.accept_task = Some(tokio::spawn(accept_loop(listener, shared)));
        tracing::info!(peer = %self.shared.local, "advertising");
        Ok(())
    }

    fn stop_advertising(&mut self) {
        self.shared.advertising.store(false, Ordering::SeqCst);
        tracing::info!(peer = %self.shared.local, "stopped advertising");
    }

    async fn send(&mut self, data: &[u8], to: &[PeerId]) -> Result<(), TransportError> {
        let links = self.shared.links();
        let mut first_error = None;
        for &peer in to {
            let delivered = links
                .get(&peer)
                .is_some_and(|link| link.outbound.send(data.to_vec()).is_ok());
            if !delivered {
                first_error.get_or_insert(TransportError::PeerUnreachable(peer));
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    async fn next_event(&mut self) -> Option<TransportEvent> {
        self.events.recv().await
    }

    async fn shutdown(&mut self) -> Result<(), TransportError> {
        self.shared.advertising.store(false, Ordering::SeqCst);
        if let Some(task) = self.accept_task.take() {
            task.abort();
        }

        let dropped: Vec<PeerId> = self.shared.links().drain().map(|(peer, _)| peer).collect();
        for peer in dropped {
            self.shared.emit(TransportEvent::PeerChanged {
                peer,
                state: PeerState::NotConnected,
            });
        }
        tracing::info!(peer = %self.shared.local, "WebSocket mesh shut down");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Link tasks
// ---------------------------------------------------------------------------

async fn accept_loop(listener: TcpListener, shared: Arc<Shared>) {
    loop {
        let (stream, addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::warn!(error = %e, "accept failed");
                continue;
            }
        };

        if !shared.advertising.load(Ordering::SeqCst) {
            tracing::debug!(%addr, "not advertising, refusing link");
            drop(stream);
            continue;
        }

        let shared = Arc::clone(&shared);
        tokio::spawn(async move {
            if let Err(e) = accept_link(stream, &shared).await {
                tracing::warn!(%addr, error = %e, "incoming link failed");
            }
        });
    }
}

async fn accept_link(stream: TcpStream, shared: &Arc<Shared>) -> Result<(), TransportError> {
    let mut ws = tokio_tungstenite::accept_async(stream)
        .await
        .map_err(|e| TransportError::Handshake(e.to_string()))?;
    let peer = exchange_hello(shared.local, &mut ws).await?;
    tracing::debug!(local = %shared.local, %peer, "accepted peer");
    register(shared, peer, ws);
    Ok(())
}

/// Sends our id and reads the remote's.
async fn exchange_hello<S>(
    local: PeerId,
    ws: &mut WebSocketStream<S>,
) -> Result<PeerId, TransportError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    ws.send(Message::Binary(local.to_bytes().to_vec().into()))
        .await
        .map_err(|e| TransportError::Handshake(e.to_string()))?;

    loop {
        match ws.next().await {
            Some(Ok(Message::Binary(data))) => {
                let peer = PeerId::from_bytes(&data).ok_or_else(|| {
                    TransportError::Handshake(format!("hello frame was {} bytes", data.len()))
                })?;
                if peer == local {
                    return Err(TransportError::Handshake("peer dialed itself".into()));
                }
                return Ok(peer);
            }
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
            Some(Ok(Message::Close(_))) | None => {
                return Err(TransportError::ConnectionClosed(
                    "closed during hello".into(),
                ));
            }
            Some(Ok(_)) => {
                return Err(TransportError::Handshake("expected binary hello".into()));
            }
            Some(Err(e)) => return Err(TransportError::Handshake(e.to_string())),
        }
    }
}

/// Installs a live link to `peer` and spawns its writer and reader tasks.
fn register<S>(shared: &Arc<Shared>, peer: PeerId, ws: WebSocketStream<S>)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();
    let link_id = NEXT_LINK_ID.fetch_add(1, Ordering::Relaxed);
    {
        let mut links = shared.links();
        if links.contains_key(&peer) {
            tracing::debug!(%peer, "already linked, dropping duplicate");
            return;
        }
        links.insert(
            peer,
            Link {
                id: link_id,
                outbound: tx,
            },
        );
    }

    shared.emit(TransportEvent::PeerChanged {
        peer,
        state: PeerState::Connecting,
    });
    shared.emit(TransportEvent::PeerChanged {
        peer,
        state: PeerState::Connected,
    });

    let (mut sink, mut stream) = ws.split();

    tokio::spawn(async move {
        while let Some(data) = rx.recv().await {
            if let Err(e) = sink.send(Message::Binary(data.into())).await {
                tracing::debug!(%peer, error = %e, "link write failed");
                break;
            }
        }
        let _ = sink.close().await;
    });

    let shared = Arc::clone(shared);
    tokio::spawn(async move {
        loop {
            match stream.next().await {
                Some(Ok(Message::Binary(data))) => shared.emit(TransportEvent::Received {
                    from: peer,
                    data: data.to_vec(),
                }),
                Some(Ok(Message::Text(text))) => shared.emit(TransportEvent::Received {
                    from: peer,
                    data: text.as_bytes().to_vec(),
                }),
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    tracing::debug!(%peer, error = %e, "link read failed");
                    break;
                }
            }
        }

        // A newer link to the same peer may have replaced ours.
        let removed = {
            let mut links = shared.links();
            let ours = links.get(&peer).is_some_and(|link| link.id == link_id);
            ours && links.remove(&peer).is_some()
        };
        if removed {
            shared.emit(TransportEvent::PeerChanged {
                peer,
                state: PeerState::NotConnected,
            });
        }
    });
}
