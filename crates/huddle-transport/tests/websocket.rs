//! Integration tests for the WebSocket mesh.
//!
//! These spin up real listeners on loopback and check that peers learn
//! each other's ids, exchange bytes in both directions, and see links go
//! away when the other side shuts down.

#[cfg(feature = "websocket")]
mod websocket {
    use std::time::Duration;

    use huddle_transport::{PeerId, PeerState, Transport, TransportEvent, WebSocketMesh};

    async fn mesh(id: u64) -> WebSocketMesh {
        let mut mesh = WebSocketMesh::bind(PeerId::new(id), "127.0.0.1:0")
            .await
            .expect("should bind");
        mesh.start().await.expect("should start");
        mesh
    }

    async fn next(mesh: &mut WebSocketMesh) -> TransportEvent {
        tokio::time::timeout(Duration::from_secs(5), mesh.next_event())
            .await
            .expect("event should arrive")
            .expect("mesh should still be running")
    }

    async fn expect_connected(mesh: &mut WebSocketMesh, peer: PeerId) {
        assert_eq!(
            next(mesh).await,
            TransportEvent::PeerChanged {
                peer,
                state: PeerState::Connecting
            }
        );
        assert_eq!(
            next(mesh).await,
            TransportEvent::PeerChanged {
                peer,
                state: PeerState::Connected
            }
        );
    }

    #[tokio::test]
    async fn test_dial_exchanges_peer_ids() {
        let mut a = mesh(1).await;
        let mut b = mesh(2).await;

        let remote = a.dial(b.local_addr()).await.expect("should dial");

        assert_eq!(remote, PeerId::new(2));
        expect_connected(&mut a, PeerId::new(2)).await;
        expect_connected(&mut b, PeerId::new(1)).await;
    }

    #[tokio::test]
    async fn test_send_delivers_bytes_both_ways() {
        let mut a = mesh(1).await;
        let mut b = mesh(2).await;
        a.dial(b.local_addr()).await.expect("should dial");
        expect_connected(&mut a, PeerId::new(2)).await;
        expect_connected(&mut b, PeerId::new(1)).await;

        a.send(b"ping", &[PeerId::new(2)]).await.expect("should send");
        assert_eq!(
            next(&mut b).await,
            TransportEvent::Received {
                from: PeerId::new(1),
                data: b"ping".to_vec()
            }
        );

        b.send(b"pong", &[PeerId::new(1)]).await.expect("should send");
        assert_eq!(
            next(&mut a).await,
            TransportEvent::Received {
                from: PeerId::new(2),
                data: b"pong".to_vec()
            }
        );
    }

    #[tokio::test]
    async fn test_send_to_unknown_peer_is_unreachable() {
        let mut a = mesh(1).await;

        let result = a.send(b"x", &[PeerId::new(42)]).await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_dial_after_stop_advertising_is_refused() {
        let a = mesh(1).await;
        let mut b = mesh(2).await;
        b.stop_advertising();

        let result = a.dial(b.local_addr()).await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_shutdown_disconnects_remote() {
        let mut a = mesh(1).await;
        let mut b = mesh(2).await;
        a.dial(b.local_addr()).await.expect("should dial");
        expect_connected(&mut a, PeerId::new(2)).await;
        expect_connected(&mut b, PeerId::new(1)).await;

        b.shutdown().await.expect("should shut down");

        assert_eq!(
            next(&mut a).await,
            TransportEvent::PeerChanged {
                peer: PeerId::new(2),
                state: PeerState::NotConnected
            }
        );
    }
}
