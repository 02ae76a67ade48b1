//! Cloneable handle to a spawned coordinator.

use huddle_games::{ActionOutcome, GameAction, GameSetup};
use huddle_transport::PeerId;
use tokio::sync::{mpsc, oneshot};

use crate::HuddleError;
use crate::coordinator::{Command, SessionInfo};

/// Handle to a running coordinator actor.
///
/// Cheap to clone; it's an `mpsc::Sender` wrapper. Every method fails
/// with [`HuddleError::Unavailable`] once the actor has stopped.
#[derive(Clone)]
pub struct CoordinatorHandle {
    local: PeerId,
    sender: mpsc::Sender<Command>,
}

impl CoordinatorHandle {
    pub(crate) fn new(local: PeerId, sender: mpsc::Sender<Command>) -> Self {
        Self { local, sender }
    }

    /// The coordinator's local peer id.
    pub fn local(&self) -> PeerId {
        self.local
    }

    /// Whether the actor is still running.
    pub fn is_running(&self) -> bool {
        !self.sender.is_closed()
    }

    /// Starts advertising (and inviting, for an inviter).
    pub async fn start(&self) -> Result<(), HuddleError> {
        self.request(|reply| Command::Start { reply }).await?
    }

    /// Starts a new round with this device as picker.
    pub async fn start_game(&self, setup: GameSetup) -> Result<(), HuddleError> {
        self.request(|reply| Command::StartGame { setup, reply })
            .await?
    }

    /// Applies a local user intent to the active game.
    pub async fn perform(&self, action: GameAction) -> Result<ActionOutcome, HuddleError> {
        self.request(|reply| Command::Perform { action, reply })
            .await?
    }

    /// Broadcasts free-form status text.
    pub async fn send_status(&self, message: impl Into<String>) -> Result<(), HuddleError> {
        let message = message.into();
        self.request(|reply| Command::SendStatus { message, reply })
            .await?
    }

    /// Requests a snapshot of session metadata.
    pub async fn info(&self) -> Result<SessionInfo, HuddleError> {
        self.request(|reply| Command::Info { reply }).await
    }

    /// Stops the actor and tears down its transport.
    ///
    /// Returns once the transport is shut down.
    pub async fn shutdown(&self) -> Result<(), HuddleError> {
        self.request(|reply| Command::Shutdown { reply }).await
    }

    async fn request<R>(
        &self,
        command: impl FnOnce(oneshot::Sender<R>) -> Command,
    ) -> Result<R, HuddleError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(command(reply_tx))
            .await
            .map_err(|_| HuddleError::Unavailable)?;
        reply_rx.await.map_err(|_| HuddleError::Unavailable)
    }
}

impl std::fmt::Debug for CoordinatorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoordinatorHandle")
            .field("local", &self.local)
            .field("running", &self.is_running())
            .finish()
    }
}
