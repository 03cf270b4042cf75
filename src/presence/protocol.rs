//! Wire protocol for presence connections
//!
//! One JSON object per WebSocket text frame, with a `type` discriminator and
//! a `payload`. Unknown types are a protocol violation.

use serde::{Deserialize, Serialize};

use super::{Position, PresenceError};

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Enter the room for a space
    #[serde(rename_all = "camelCase")]
    Join { space_id: String, token: String },
    /// Step to an adjacent cell
    Move { x: i64, y: i64 },
    /// Leave the current room without closing the connection
    Leave,
}

impl ClientMessage {
    /// Decode one inbound text frame
    pub fn decode(text: &str) -> Result<Self, PresenceError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Another occupant as seen by a joining session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPosition {
    pub user_id: String,
    pub position: Position,
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// Acknowledgment to the joiner with its spawn and the current occupants
    SpaceJoined {
        spawn: Position,
        users: Vec<UserPosition>,
    },
    /// Someone else entered the room
    #[serde(rename_all = "camelCase")]
    UserJoined { user_id: String, x: i64, y: i64 },
    /// The requester's move was refused; carries the unchanged position
    MovementRejected { x: i64, y: i64 },
    /// Someone else moved
    #[serde(rename_all = "camelCase")]
    Movement { user_id: String, x: i64, y: i64 },
    /// Someone else left or disconnected
    #[serde(rename_all = "camelCase")]
    UserLeft { user_id: String },
    /// Failure local to the receiving connection
    Error { code: String, message: String },
}

impl ServerMessage {
    pub fn error(err: &PresenceError) -> Self {
        ServerMessage::Error {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }

    /// Value of the `type` discriminator
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::SpaceJoined { .. } => "space-joined",
            ServerMessage::UserJoined { .. } => "user-joined",
            ServerMessage::MovementRejected { .. } => "movement-rejected",
            ServerMessage::Movement { .. } => "movement",
            ServerMessage::UserLeft { .. } => "user-left",
            ServerMessage::Error { .. } => "error",
        }
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
