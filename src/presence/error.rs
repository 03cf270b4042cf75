//! Presence error taxonomy
//!
//! Every variant is local to the connection that caused it and maps to a
//! stable wire `code`. Rejected moves are not errors; they travel as
//! `movement-rejected` events.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PresenceError {
    #[error("invalid or missing token")]
    Unauthorized,

    #[error("space not found: {0}")]
    SpaceNotFound(String),

    #[error("not joined to a space")]
    NotJoined,

    #[error("already joined to space {0}")]
    AlreadyJoined(String),

    #[error("malformed message: {0}")]
    Malformed(String),

    #[error("backend error: {0}")]
    Backend(String),
}

impl PresenceError {
    /// Wire code carried in the `error` event payload
    pub fn code(&self) -> &'static str {
        match self {
            PresenceError::Unauthorized => "unauthorized",
            PresenceError::SpaceNotFound(_) => "space-not-found",
            PresenceError::NotJoined => "not-joined",
            PresenceError::AlreadyJoined(_) => "already-joined",
            PresenceError::Malformed(_) => "malformed",
            PresenceError::Backend(_) => "internal",
        }
    }
}

impl From<serde_json::Error> for PresenceError {
    fn from(err: serde_json::Error) -> Self {
        PresenceError::Malformed(err.to_string())
    }
}
