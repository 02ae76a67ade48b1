//! Three peers on one machine play a round of Hangman over a WebSocket
//! mesh. Set `RUST_LOG=debug` to watch the coordinators work.

use std::time::Duration;

use huddle::games::GameError;
use huddle::prelude::*;
use huddle::transport::MeshDialer;
use tokio::sync::mpsc;

const SECRET: &str = "rustacean";
const GUESSES: [&str; 11] = ["e", "a", "z", "r", "s", "q", "t", "u", "x", "c", "n"];

struct Player {
    name: &'static str,
    handle: CoordinatorHandle,
    dialer: MeshDialer,
    addr: std::net::SocketAddr,
}

async fn join(
    name: &'static str,
    key: u64,
    role: SessionRole,
) -> Result<Player, HuddleError> {
    let mesh = WebSocketMesh::bind(PeerId::new(key), "127.0.0.1:0").await?;
    let dialer = mesh.dialer();
    let addr = mesh.local_addr();

    let (coordinator, events) =
        PeerSessionCoordinator::new(mesh, JsonCodec, CoordinatorConfig::with_role(role));
    let handle = coordinator.spawn();
    handle.start().await?;
    tokio::spawn(narrate(name, events));

    Ok(Player {
        name,
        handle,
        dialer,
        addr,
    })
}

async fn narrate(name: &'static str, mut events: mpsc::UnboundedReceiver<SessionEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            SessionEvent::HostChanged { host } => tracing::info!(player = name, %host, "host is now"),
            SessionEvent::GameStarted { kind } => tracing::info!(player = name, %kind, "game on"),
            SessionEvent::Game(GameEvent::Hangman(HangmanEvent::StateChanged { snapshot, display: board })) => {
                tracing::info!(
                    player = name,
                    word = %board,
                    left = snapshot.guesses_remaining(),
                    next = %snapshot.guesser(),
                    "board"
                );
            }
            SessionEvent::Game(GameEvent::Hangman(HangmanEvent::Concluded { state, word })) => {
                tracing::info!(player = name, ?state, %word, "round over");
            }
            SessionEvent::PeersLost(peers) => tracing::info!(player = name, ?peers, "lost peers"),
            other => tracing::debug!(player = name, event = ?other, "event"),
        }
    }
}

/// Waits until `player` sees `host` as the session host.
async fn await_host(player: &Player, host: PeerId) -> Result<(), HuddleError> {
    while player.handle.info().await?.host != host {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let alice = join("alice", 1, SessionRole::Advertiser).await?;
    let bob = join("bob", 2, SessionRole::Inviter).await?;
    let carol = join("carol", 3, SessionRole::Inviter).await?;
    let alice_id = alice.handle.local();

    // Bob joins Alice. Bob then reaches Carol while she is still looking,
    // so she first adopts Bob; once she links with Alice, Alice's setHost
    // settles it.
    bob.dialer.dial(alice.addr).await?;
    await_host(&bob, alice_id).await?;
    bob.dialer.dial(carol.addr).await?;
    carol.dialer.dial(alice.addr).await?;
    await_host(&carol, alice_id).await?;

    let info = alice.handle.info().await?;
    tracing::info!(peers = ?info.peers, host = %info.host, "mesh formed");

    alice
        .handle
        .start_game(GameSetup::Hangman {
            word: SECRET.into(),
        })
        .await?;

    let mut last = None;
    'round: for letter in GUESSES {
        loop {
            for player in [&bob, &carol] {
                match player.handle.perform(GameAction::Guess(letter.into())).await {
                    Ok(ActionOutcome::Guess(result)) => {
                        tracing::info!(player = player.name, letter, ?result, "guessed");
                        last = Some(result);
                        if matches!(result, GuessResult::WordGuessed | GuessResult::NoMoreGuesses) {
                            break 'round;
                        }
                        continue 'round;
                    }
                    Ok(other) => tracing::warn!(?other, "unexpected outcome"),
                    Err(HuddleError::Game(GameError::NotYourTurn { .. }))
                    | Err(HuddleError::NoActiveGame) => {}
                    Err(err) => return Err(err.into()),
                }
            }
            // Neither has seen the latest snapshot yet.
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    // Let the last snapshot reach Alice before tearing the mesh down.
    tokio::time::sleep(Duration::from_millis(200)).await;
    match last {
        Some(GuessResult::WordGuessed) => tracing::info!("the guessers win"),
        Some(GuessResult::NoMoreGuesses) => tracing::info!("alice wins"),
        _ => tracing::info!("ran out of letters to try"),
    }

    for player in [&alice, &bob, &carol] {
        player.handle.shutdown().await?;
    }
    Ok(())
}
