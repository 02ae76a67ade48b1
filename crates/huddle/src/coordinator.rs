//! The peer session coordinator: one actor per device.
//!
//! The coordinator owns everything that has to agree across the mesh:
//! the transport, the roster, who the host is, the disconnect debouncer,
//! and the active game. It runs as a single Tokio task, so none of that
//! state needs a lock:
//!
//! ```text
//!   CoordinatorHandle ──Command──▶ ┌──────────────────────────┐
//!                                  │  select! {               │
//!   Transport ──TransportEvent──▶  │    commands,             │ ──SessionEvent──▶ UI
//!                                  │    transport.next_event, │
//!   Debouncer ──batch of lost───▶  │    lost.wait,            │
//!                                  │  }                       │
//!                                  └──────────────────────────┘
//! ```
//!
//! # Host rules
//!
//! Every coordinator starts as its own host. An inviter adopts the first
//! peer it links with as host and stops advertising. A host greets every
//! newcomer with `setHost` and, if a game is running, the full state in
//! `setGame`. When the host drops, everyone independently picks the first
//! peer of the remaining turn order, which needs no messages because the
//! order is the same everywhere.
//!
//! Two hosts can meet when two established sessions link up. Each greets
//! the other with `setHost`, and the lower `PeerId` keeps the session: the
//! other side yields and passes the new host on to its own guests.
//!
//! # Lost peers
//!
//! Every peer debounces disconnects. When the window closes, the host
//! reports the batch and lets the game react, broadcasting any new
//! snapshot. Other peers only ask the game whether the loss ended it, and
//! drop it locally if so, since nothing is broadcast for a dead game.

use huddle_debounce::Debouncer;
use huddle_games::{
    ActionOutcome, ActiveGame, GameAction, GameContext, GameError, GameEvent, GameSetup,
    GameStateChannel, LossOutcome,
};
use huddle_protocol::{
    Codec, CommandEnvelope, GameKind, JsonCodec, decode_envelope, encode_envelope,
};
use huddle_session::{PeerRoster, TurnOrderError};
use huddle_transport::{PeerId, PeerState, Transport, TransportEvent};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, trace, warn};

use crate::{CoordinatorConfig, CoordinatorHandle, HuddleError, SessionEvent, SessionRole};

/// A snapshot of session metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    /// This device.
    pub local: PeerId,
    /// Who this device believes the host is.
    pub host: PeerId,
    /// Every member in turn order, including the local device.
    pub peers: Vec<PeerId>,
    /// The running game, if any.
    pub active_game: Option<GameKind>,
    /// Whether this device is still waiting to adopt a host.
    pub inviting: bool,
}

impl SessionInfo {
    /// Whether the local device is the host.
    pub fn is_host(&self) -> bool {
        self.local == self.host
    }
}

/// Requests sent from a [`CoordinatorHandle`] to the actor.
pub(crate) enum Command {
    Start {
        reply: oneshot::Sender<Result<(), HuddleError>>,
    },
    StartGame {
        setup: GameSetup,
        reply: oneshot::Sender<Result<(), HuddleError>>,
    },
    Perform {
        action: GameAction,
        reply: oneshot::Sender<Result<ActionOutcome, HuddleError>>,
    },
    SendStatus {
        message: String,
        reply: oneshot::Sender<Result<(), HuddleError>>,
    },
    Info {
        reply: oneshot::Sender<SessionInfo>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Coordinates one device's view of a peer session.
///
/// Use it directly for step-by-step control, or [`spawn`](Self::spawn)
/// it and talk to it through a [`CoordinatorHandle`].
pub struct PeerSessionCoordinator<T: Transport, C: Codec = JsonCodec> {
    transport: T,
    codec: C,
    config: CoordinatorConfig,
    roster: PeerRoster,
    host: PeerId,
    inviting: bool,
    active: Option<ActiveGame>,
    lost: Debouncer<PeerId>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl<T: Transport, C: Codec> PeerSessionCoordinator<T, C> {
    /// Creates a coordinator and the receiver for its events.
    ///
    /// The local device starts out as the host with an empty roster.
    pub fn new(
        transport: T,
        codec: C,
        config: CoordinatorConfig,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let config = config.validated();
        let local = transport.local_peer();
        let (events, receiver) = mpsc::unbounded_channel();
        let coordinator = Self {
            roster: PeerRoster::new(local),
            host: local,
            inviting: false,
            active: None,
            lost: Debouncer::new(config.debounce()),
            transport,
            codec,
            config,
            events,
        };
        (coordinator, receiver)
    }

    /// This device's id.
    pub fn local(&self) -> PeerId {
        self.roster.local()
    }

    /// Who this device believes the host is.
    pub fn host(&self) -> PeerId {
        self.host
    }

    /// Whether the local device is the host.
    pub fn is_host(&self) -> bool {
        self.host == self.local()
    }

    /// The current roster.
    pub fn roster(&self) -> &PeerRoster {
        &self.roster
    }

    /// The running game, if any.
    pub fn active_game(&self) -> Option<&ActiveGame> {
        self.active.as_ref()
    }

    /// Whether this device is still waiting to adopt a host.
    pub fn is_inviting(&self) -> bool {
        self.inviting
    }

    /// The effective (validated) configuration.
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// A snapshot of session metadata.
    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            local: self.local(),
            host: self.host,
            peers: self.roster.turn_order().sorted_peers().to_vec(),
            active_game: self.active.as_ref().map(GameStateChannel::kind),
            inviting: self.inviting,
        }
    }

    // =====================================================================
    // Outbound operations
    // =====================================================================

    /// Starts advertising. An inviter also begins looking for a host.
    pub async fn start(&mut self) -> Result<(), HuddleError> {
        self.transport.start().await?;
        self.inviting = self.config.role == SessionRole::Inviter;
        info!(local = %self.local(), role = %self.config.role, "session started");
        Ok(())
    }

    /// Sends raw bytes to `to`. Does nothing when `to` is empty.
    ///
    /// # Errors
    /// The transport's error, which is also surfaced as
    /// [`SessionEvent::TransportFailed`].
    pub async fn send(&mut self, data: &[u8], to: &[PeerId]) -> Result<(), HuddleError> {
        if to.is_empty() {
            trace!("send with no recipients skipped");
            return Ok(());
        }
        if let Err(err) = self.transport.send(data, to).await {
            warn!(error = %err, recipients = to.len(), "transport send failed");
            self.emit(SessionEvent::TransportFailed {
                error: err.to_string(),
            });
            return Err(err.into());
        }
        Ok(())
    }

    /// Sends `setGame` to `peer`, or to every connected peer if `None`.
    pub async fn set_game(
        &mut self,
        game: GameKind,
        payload: Vec<u8>,
        peer: Option<PeerId>,
    ) -> Result<(), HuddleError> {
        let to = match peer {
            Some(peer) => vec![peer],
            None => self.roster.connected_peers(),
        };
        debug!(%game, recipients = to.len(), "sending setGame");
        self.send_envelope(&CommandEnvelope::SetGame { game, payload }, &to)
            .await
    }

    /// Broadcasts a game module's inner command as `gameData`.
    pub async fn send_game_command(&mut self, payload: Vec<u8>) -> Result<(), HuddleError> {
        let to = self.roster.connected_peers();
        self.send_envelope(&CommandEnvelope::GameData { payload }, &to)
            .await
    }

    /// Broadcasts free-form status text.
    pub async fn send_status(&mut self, message: impl Into<String>) -> Result<(), HuddleError> {
        let to = self.roster.connected_peers();
        let message = message.into();
        self.send_envelope(&CommandEnvelope::Status { message }, &to)
            .await
    }

    /// Starts a new round with the local device as picker and sends the
    /// full state to every connected peer.
    ///
    /// Replaces any game already running.
    pub async fn start_game(&mut self, setup: GameSetup) -> Result<(), HuddleError> {
        let turn = self.roster.turn_order();
        let game = ActiveGame::start(&setup, self.local(), &turn).inspect_err(|err| {
            warn!(error = %err, game = %setup.kind(), "game start rejected");
        })?;
        let kind = game.kind();
        let state = game.encode_state(&self.codec)?;
        let announce = game.state_event();
        self.active = Some(game);

        info!(%kind, players = turn.len(), "game started");
        self.emit(SessionEvent::GameStarted { kind });
        self.emit(SessionEvent::Game(announce));
        self.set_game(kind, state, None).await
    }

    /// Applies a local user intent to the active game.
    ///
    /// # Errors
    /// - `HuddleError::NoActiveGame` if nothing is running.
    /// - `HuddleError::Game` if the game rejected the action. Nothing was
    ///   changed or sent.
    /// - `HuddleError::TurnOrder` if the turn order couldn't answer. Debug
    ///   builds panic instead.
    pub async fn perform(&mut self, action: GameAction) -> Result<ActionOutcome, HuddleError> {
        let turn = self.roster.turn_order();
        let Some(game) = self.active.as_mut() else {
            debug!(action = action.name(), "action with no active game");
            return Err(HuddleError::NoActiveGame);
        };

        let name = action.name();
        let mut ctx = GameContext::new(turn, &self.codec);
        let result = game.perform(action, &mut ctx);
        let (outbound, events) = ctx.into_parts();

        let outcome = result.map_err(|err| action_rejected(name, err))?;
        trace!(action = name, ?outcome, "action applied");
        self.flush(outbound, events).await?;
        Ok(outcome)
    }

    // =====================================================================
    // Inbound
    // =====================================================================

    /// Reacts to one transport event.
    ///
    /// Nothing here fails outward: decode problems become
    /// [`SessionEvent::DecodeFailed`] and send problems become
    /// [`SessionEvent::TransportFailed`].
    pub async fn handle_transport_event(&mut self, event: TransportEvent) {
        let result = match event {
            TransportEvent::PeerChanged { peer, state } => {
                debug!(%peer, %state, "peer state changed");
                self.emit(SessionEvent::PeerChanged { peer, state });
                match state {
                    PeerState::Connecting => Ok(()),
                    PeerState::Connected => self.on_peer_connected(peer).await,
                    PeerState::NotConnected => {
                        self.on_peer_disconnected(peer);
                        Ok(())
                    }
                }
            }
            TransportEvent::Received { from, data } => self.on_received(from, &data).await,
        };
        if let Err(err) = result {
            warn!(error = %err, "failed to handle transport event");
        }
    }

    async fn on_peer_connected(&mut self, peer: PeerId) -> Result<(), HuddleError> {
        if !self.roster.insert(peer) {
            debug!(%peer, "peer already in roster");
        }

        if self.inviting {
            self.inviting = false;
            self.transport.stop_advertising();
            info!(%peer, "invitation accepted, adopting host");
            self.set_host(peer);
            return Ok(());
        }

        if self.is_host() {
            let local = self.local();
            self.send_envelope(&CommandEnvelope::SetHost { host: local }, &[peer])
                .await?;
            if let Some(game) = &self.active {
                let kind = game.kind();
                let state = game.encode_state(&self.codec)?;
                debug!(%peer, %kind, "catching up new peer");
                self.set_game(kind, state, Some(peer)).await?;
            }
        }
        Ok(())
    }

    fn on_peer_disconnected(&mut self, peer: PeerId) {
        if !self.roster.remove(peer) {
            debug!(%peer, "disconnect from a peer not in the roster");
            return;
        }

        if peer == self.host {
            match self.roster.turn_order().first(&[]) {
                Ok(next) => {
                    info!(old = %peer, new = %next, "host left, migrating");
                    self.set_host(next);
                }
                Err(err) => turn_order_violated("host migration", &err),
            }
        }

        if self.lost.push(peer) {
            debug!(%peer, window_ms = self.lost.window().as_millis() as u64, "disconnect debounce armed");
        }
    }

    async fn on_received(&mut self, from: PeerId, data: &[u8]) -> Result<(), HuddleError> {
        let envelope = match decode_envelope(&self.codec, data) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(%from, error = %err, bytes = data.len(), "dropping undecodable command");
                self.emit(SessionEvent::DecodeFailed {
                    from,
                    error: err.to_string(),
                });
                return Ok(());
            }
        };
        trace!(%from, command = envelope.name(), "routing command");

        match envelope {
            CommandEnvelope::SetGame { game, payload } => {
                match ActiveGame::decode(game, &self.codec, &payload) {
                    Ok(active) => {
                        let announce = active.state_event();
                        self.active = Some(active);
                        info!(%from, %game, "game received");
                        self.emit(SessionEvent::GameStarted { kind: game });
                        self.emit(SessionEvent::Game(announce));
                    }
                    Err(err) => {
                        warn!(%from, %game, error = %err, "dropping undecodable game state");
                        self.emit(SessionEvent::DecodeFailed {
                            from,
                            error: err.to_string(),
                        });
                    }
                }
                Ok(())
            }
            CommandEnvelope::GameData { payload } => {
                let turn = self.roster.turn_order();
                let Some(game) = self.active.as_mut() else {
                    warn!(%from, "gameData with no active game");
                    self.emit(SessionEvent::UnexpectedCommand {
                        from,
                        command: "gameData",
                    });
                    return Ok(());
                };
                let mut ctx = GameContext::new(turn, &self.codec);
                let result = game.apply_payload(&payload, &mut ctx);
                let (outbound, events) = ctx.into_parts();
                if let Err(err) = result {
                    warn!(%from, error = %err, "dropping undecodable game payload");
                    self.emit(SessionEvent::DecodeFailed {
                        from,
                        error: err.to_string(),
                    });
                }
                self.flush(outbound, events).await
            }
            CommandEnvelope::Status { message } => {
                debug!(%from, "status received");
                self.emit(SessionEvent::Status { from, message });
                Ok(())
            }
            CommandEnvelope::SetHost { host } => self.on_set_host(from, host).await,
        }
    }

    /// Applies a `setHost` claim.
    ///
    /// A guest takes whatever it is told. A host only gives way to a lower
    /// id, then relays the claim so its own guests follow.
    async fn on_set_host(&mut self, from: PeerId, host: PeerId) -> Result<(), HuddleError> {
        let local = self.local();
        if !self.is_host() || host == local {
            self.set_host(host);
            return Ok(());
        }
        if host > local {
            debug!(%from, claimed = %host, "keeping host over a higher claim");
            return Ok(());
        }

        info!(%from, claimed = %host, "yielding host to a lower claim");
        self.set_host(host);
        let guests: Vec<PeerId> = self
            .roster
            .connected_peers()
            .into_iter()
            .filter(|peer| *peer != from && *peer != host)
            .collect();
        self.send_envelope(&CommandEnvelope::SetHost { host }, &guests)
            .await
    }

    /// Handles a fired disconnect window.
    ///
    /// Peers that reconnected inside the window are dropped from the
    /// batch; the rest are reported once and handed to the active game.
    async fn on_peers_lost(&mut self, batch: Vec<PeerId>) {
        let lost: Vec<PeerId> = batch
            .into_iter()
            .filter(|peer| !self.roster.contains(*peer))
            .collect();
        if lost.is_empty() {
            debug!("every debounced peer came back");
            return;
        }
        if !self.is_host() {
            self.abandon_if_ended(&lost);
            return;
        }
        info!(count = lost.len(), "peers lost");
        self.emit(SessionEvent::PeersLost(lost.clone()));

        let turn = self.roster.turn_order();
        let Some(game) = self.active.as_mut() else {
            return;
        };
        let kind = game.kind();
        let mut ctx = GameContext::new(turn, &self.codec);
        let result = game.handle_lost_peers(&lost, &mut ctx);
        let (outbound, events) = ctx.into_parts();

        match result {
            Ok(LossOutcome::Continues) => {}
            Ok(LossOutcome::Abandoned) => {
                info!(%kind, "game abandoned");
                self.active = None;
            }
            Err(GameError::TurnOrder(err)) => turn_order_violated("lost peers", &err),
            Err(err) => error!(%kind, error = %err, "failed to handle lost peers"),
        }
        if let Err(err) = self.flush(outbound, events).await {
            warn!(error = %err, "failed to broadcast after peer loss");
        }
    }

    /// Drops the active game on a non-host if losing `lost` ended it.
    fn abandon_if_ended(&mut self, lost: &[PeerId]) {
        let turn = self.roster.turn_order();
        let Some(game) = &self.active else {
            return;
        };
        let kind = game.kind();
        let Some(reason) = game.abandon_reason(lost, &turn) else {
            trace!(%kind, "game survives peer loss, host will follow up");
            return;
        };
        info!(%kind, %reason, "game abandoned");
        self.active = None;
        self.emit(SessionEvent::Game(GameEvent::Abandoned { kind, reason }));
    }

    // =====================================================================
    // Helpers
    // =====================================================================

    fn set_host(&mut self, host: PeerId) {
        if self.host == host {
            trace!(%host, "host unchanged");
            return;
        }
        info!(old = %self.host, new = %host, "host changed");
        self.host = host;
        self.emit(SessionEvent::HostChanged { host });
    }

    async fn send_envelope(
        &mut self,
        envelope: &CommandEnvelope,
        to: &[PeerId],
    ) -> Result<(), HuddleError> {
        let bytes = encode_envelope(&self.codec, envelope)?;
        self.send(&bytes, to).await
    }

    /// Forwards game events and broadcasts the game's outbound commands.
    async fn flush(
        &mut self,
        outbound: Vec<Vec<u8>>,
        events: Vec<GameEvent>,
    ) -> Result<(), HuddleError> {
        for event in events {
            self.emit(SessionEvent::Game(event));
        }
        for payload in outbound {
            self.send_game_command(payload).await?;
        }
        Ok(())
    }

    fn emit(&self, event: SessionEvent) {
        if self.events.send(event).is_err() {
            trace!("session event dropped, receiver gone");
        }
    }

    // =====================================================================
    // Actor
    // =====================================================================

    /// Moves the coordinator onto a Tokio task and returns a handle to it.
    pub fn spawn(self) -> CoordinatorHandle {
        let (sender, receiver) = mpsc::channel(self.config.command_buffer);
        let handle = CoordinatorHandle::new(self.local(), sender);
        tokio::spawn(self.run(receiver));
        handle
    }

    /// Runs the actor loop until shutdown, until every handle is dropped,
    /// or until the transport closes.
    pub(crate) async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        info!(local = %self.local(), "coordinator started");

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Shutdown { reply }) => {
                        self.shutdown().await;
                        let _ = reply.send(());
                        return;
                    }
                    Some(command) => self.handle_command(command).await,
                    None => {
                        debug!("every handle dropped");
                        break;
                    }
                },
                event = self.transport.next_event() => match event {
                    Some(event) => self.handle_transport_event(event).await,
                    None => {
                        warn!("transport closed");
                        break;
                    }
                },
                lost = self.lost.wait() => self.on_peers_lost(lost).await,
            }
        }

        self.shutdown().await;
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Start { reply } => {
                let _ = reply.send(self.start().await);
            }
            Command::StartGame { setup, reply } => {
                let _ = reply.send(self.start_game(setup).await);
            }
            Command::Perform { action, reply } => {
                let _ = reply.send(self.perform(action).await);
            }
            Command::SendStatus { message, reply } => {
                let _ = reply.send(self.send_status(message).await);
            }
            Command::Info { reply } => {
                let _ = reply.send(self.info());
            }
            Command::Shutdown { reply } => {
                // Handled by the run loop before dispatch.
                let _ = reply.send(());
            }
        }
    }

    async fn shutdown(&mut self) {
        let abandoned = self.lost.cancel();
        if !abandoned.is_empty() {
            debug!(count = abandoned.len(), "discarding pending disconnects");
        }
        if let Err(err) = self.transport.shutdown().await {
            warn!(error = %err, "transport shutdown failed");
        }
        info!(local = %self.local(), "coordinator stopped");
    }
}

/// Maps a game's rejection of a local action, unwrapping turn-order bugs.
fn action_rejected(action: &'static str, err: GameError) -> HuddleError {
    match err {
        GameError::TurnOrder(err) => {
            turn_order_violated(action, &err);
            HuddleError::TurnOrder(err)
        }
        err => {
            debug!(action, error = %err, "action rejected");
            HuddleError::Game(err)
        }
    }
}

/// Reports a turn-order query that should never fail. Debug builds panic.
fn turn_order_violated(during: &'static str, err: &TurnOrderError) {
    error!(during, error = %err, "turn order violated");
    if cfg!(debug_assertions) {
        panic!("turn order violated during {during}: {err}");
    }
}
