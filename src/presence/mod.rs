//! Real-time presence engine
//!
//! Admits connections into shared rooms (one room per space), validates
//! every movement against the space geometry and broadcasts authoritative
//! state changes to the other occupants.
//!
//! The engine reaches identity and space data only through the
//! [`IdentityVerifier`] and [`SpaceDirectory`] traits.

mod error;
pub mod movement;
pub mod protocol;
pub mod registry;
pub mod session;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use error::PresenceError;
pub use movement::{validate_move, MoveDecision};
pub use protocol::{ClientMessage, ServerMessage, UserPosition};
pub use registry::{JoinOutcome, MemberInfo, MoveOutcome, Outbox, RoomRegistry};
pub use session::{ConnectionSession, PresenceHub, SessionId, SessionState};

/// Integer grid cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i64,
    pub y: i64,
}

impl Position {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Space dimensions. Fixed for the lifetime of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub width: i64,
    pub height: i64,
}

impl Bounds {
    pub fn new(width: i64, height: i64) -> Self {
        Self { width, height }
    }

    /// True if `pos` lies in `[0, width) x [0, height)`
    pub fn contains(&self, pos: Position) -> bool {
        pos.x >= 0 && pos.x < self.width && pos.y >= 0 && pos.y < self.height
    }

    /// Number of cells in the grid
    pub fn area(&self) -> u64 {
        (self.width.max(0) as u64).saturating_mul(self.height.max(0) as u64)
    }
}

/// Account role attached to a verified token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// Result of resolving an access token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub role: Role,
}

/// Catalog element that can be placed in a space
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    pub id: String,
    pub image_url: String,
    pub width: i64,
    pub height: i64,
    #[serde(rename = "static")]
    pub is_static: bool,
}

/// An element instance at a fixed cell of a space
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlacedElement {
    pub id: String,
    pub element: Element,
    #[serde(flatten)]
    pub position: Position,
}

/// What the directory knows about a space
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpaceLayout {
    pub bounds: Bounds,
    pub elements: Vec<PlacedElement>,
}

/// Resolves access tokens to identities
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Returns `Ok(None)` for an unknown or revoked token
    async fn verify_token(&self, token: &str) -> Result<Option<Identity>, PresenceError>;
}

/// Resolves space identifiers to their geometry and static layout
#[async_trait]
pub trait SpaceDirectory: Send + Sync {
    /// Returns `Ok(None)` if the space does not exist
    async fn get_space(&self, space_id: &str) -> Result<Option<SpaceLayout>, PresenceError>;
}
