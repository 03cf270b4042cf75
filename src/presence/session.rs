//! Connection sessions and message dispatch
//!
//! A [`ConnectionSession`] is owned by exactly one connection task. It moves
//! through `Connected -> Joined -> Closed`, decodes inbound frames, and
//! reports every failure on its own outbox only.

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::protocol::{ClientMessage, ServerMessage};
use super::registry::{JoinOutcome, MoveOutcome, Outbox, RoomRegistry};
use super::{IdentityVerifier, Position, PresenceError, SpaceDirectory};

/// Process-unique session identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Shared handles every session needs
#[derive(Clone)]
pub struct PresenceHub {
    pub registry: Arc<RoomRegistry>,
    pub identity: Arc<dyn IdentityVerifier>,
    pub directory: Arc<dyn SpaceDirectory>,
}

impl PresenceHub {
    pub fn new(
        registry: Arc<RoomRegistry>,
        identity: Arc<dyn IdentityVerifier>,
        directory: Arc<dyn SpaceDirectory>,
    ) -> Self {
        Self {
            registry,
            identity,
            directory,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Open, no room yet
    Connected,
    /// Admitted to a room
    Joined,
    /// Terminal
    Closed,
}

/// Server-side state of one open connection
pub struct ConnectionSession {
    id: SessionId,
    hub: PresenceHub,
    outbox: Outbox,
    state: SessionState,
    user_id: Option<String>,
    room_id: Option<String>,
    position: Option<Position>,
}

impl ConnectionSession {
    /// Create a session and the receiving end of its outbound queue
    pub fn open(hub: PresenceHub) -> (Self, mpsc::UnboundedReceiver<ServerMessage>) {
        let (outbox, rx) = mpsc::unbounded_channel();
        let session = Self {
            id: SessionId::new(),
            hub,
            outbox,
            state: SessionState::Connected,
            user_id: None,
            room_id: None,
            position: None,
        };
        (session, rx)
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn room_id(&self) -> Option<&str> {
        self.room_id.as_deref()
    }

    pub fn position(&self) -> Option<Position> {
        self.position
    }

    /// Decode and handle one inbound text frame
    pub async fn handle_frame(&mut self, text: &str) {
        match ClientMessage::decode(text) {
            Ok(msg) => self.handle_message(msg).await,
            Err(e) => self.reply_error(&e),
        }
    }

    /// Handle one decoded message. Failures go back to this connection only.
    pub async fn handle_message(&mut self, msg: ClientMessage) {
        let result = match msg {
            ClientMessage::Join { space_id, token } => {
                self.join(&space_id, &token).await.map(|_| ())
            }
            ClientMessage::Move { x, y } => self.move_to(Position::new(x, y)).map(|_| ()),
            ClientMessage::Leave => self.leave(),
        };
        if let Err(e) = result {
            self.reply_error(&e);
        }
    }

    /// Report a frame the transport could not hand over as text
    pub fn reject_frame(&self, reason: &str) {
        self.reply_error(&PresenceError::Malformed(reason.to_string()));
    }

    /// Verify the token, resolve the space and enter its room.
    ///
    /// On failure the session stays `Connected` and may retry.
    pub async fn join(
        &mut self,
        space_id: &str,
        token: &str,
    ) -> Result<JoinOutcome, PresenceError> {
        match self.state {
            SessionState::Connected => {}
            SessionState::Joined => {
                return Err(PresenceError::AlreadyJoined(
                    self.room_id.clone().unwrap_or_default(),
                ))
            }
            SessionState::Closed => return Err(PresenceError::NotJoined),
        }

        let identity = self
            .hub
            .identity
            .verify_token(token)
            .await?
            .ok_or(PresenceError::Unauthorized)?;

        let bounds = self
            .hub
            .registry
            .resolve_bounds(space_id, self.hub.directory.as_ref())
            .await?;

        let outcome = self.hub.registry.join(
            space_id,
            bounds,
            self.id,
            &identity.user_id,
            self.outbox.clone(),
        );

        info!(
            "Session {} joined space {} as {} at {}",
            self.id, space_id, identity.user_id, outcome.spawn
        );

        self.state = SessionState::Joined;
        self.user_id = Some(identity.user_id);
        self.room_id = Some(space_id.to_string());
        self.position = Some(outcome.spawn);
        Ok(outcome)
    }

    /// Request a single-cell step. A rejected move echoes the unchanged
    /// position to this connection and nobody else.
    pub fn move_to(&mut self, requested: Position) -> Result<MoveOutcome, PresenceError> {
        let room_id = match (self.state, self.room_id.as_deref()) {
            (SessionState::Joined, Some(room_id)) => room_id,
            _ => return Err(PresenceError::NotJoined),
        };

        let outcome = self.hub.registry.move_member(room_id, self.id, requested)?;
        match outcome {
            MoveOutcome::Accepted(next) => {
                self.position = Some(next);
            }
            MoveOutcome::Rejected(kept) => {
                debug!(
                    "Session {} move to {} rejected, kept {}",
                    self.id, requested, kept
                );
                self.position = Some(kept);
                self.send(ServerMessage::MovementRejected {
                    x: kept.x,
                    y: kept.y,
                });
            }
        }
        Ok(outcome)
    }

    /// Leave the current room and return to `Connected`
    pub fn leave(&mut self) -> Result<(), PresenceError> {
        if self.state != SessionState::Joined {
            return Err(PresenceError::NotJoined);
        }
        self.leave_room();
        self.state = SessionState::Connected;
        Ok(())
    }

    /// Terminal transition. Leaves the room, if any, exactly once.
    pub fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.leave_room();
        self.state = SessionState::Closed;
        info!("Session {} closed", self.id);
    }

    fn leave_room(&mut self) {
        if let Some(room_id) = self.room_id.take() {
            self.hub.registry.leave(&room_id, self.id);
        }
        self.user_id = None;
        self.position = None;
    }

    fn reply_error(&self, err: &PresenceError) {
        match err {
            PresenceError::Backend(_) => warn!("Session {}: {}", self.id, err),
            _ => debug!("Session {}: {}", self.id, err),
        }
        self.send(ServerMessage::error(err));
    }

    fn send(&self, msg: ServerMessage) {
        if self.outbox.send(msg).is_err() {
            debug!("Session {} outbox closed", self.id);
        }
    }
}

impl Drop for ConnectionSession {
    fn drop(&mut self) {
        self.close();
    }
}
