//! Room registry and broadcaster
//!
//! Maps space ids to live rooms. Each room guards its own membership and
//! member positions behind a per-room mutex, so traffic in one room never
//! serializes another. Events are enqueued on unbounded per-session
//! channels while the room guard is held; enqueueing never suspends, and the
//! order in which events enter a channel is the room's history.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::movement::{spawn_point, validate_move, MoveDecision};
use super::protocol::{ServerMessage, UserPosition};
use super::session::SessionId;
use super::{Bounds, Position, PresenceError, SpaceDirectory};

/// Outbound event queue of one session
pub type Outbox = mpsc::UnboundedSender<ServerMessage>;

/// Snapshot of one room member
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberInfo {
    pub session_id: SessionId,
    pub user_id: String,
    pub position: Position,
}

/// Result of admitting a session into a room
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    pub spawn: Position,
    pub bounds: Bounds,
    /// Members present before the join, excluding the joiner
    pub others: Vec<MemberInfo>,
}

/// Result of a move request from a member
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    Accepted(Position),
    Rejected(Position),
}

struct Member {
    user_id: String,
    position: Position,
    outbox: Outbox,
}

struct RoomState {
    bounds: Bounds,
    members: BTreeMap<SessionId, Member>,
    /// Joins over the room's lifetime, drives spawn placement
    joins: u64,
    /// Set once the room has been removed from the registry
    evicted: bool,
}

impl RoomState {
    /// Deliver to every member except `exclude`. Returns the number of
    /// queues that accepted the event.
    fn broadcast(&self, event: &ServerMessage, exclude: Option<SessionId>) -> usize {
        let mut delivered = 0;
        for (session_id, member) in &self.members {
            if Some(*session_id) == exclude {
                continue;
            }
            if member.outbox.send(event.clone()).is_ok() {
                delivered += 1;
            } else {
                debug!(
                    "Dropped {} for closing session {}",
                    event.kind(),
                    session_id
                );
            }
        }
        delivered
    }

    fn others(&self, session_id: SessionId) -> Vec<MemberInfo> {
        self.members
            .iter()
            .filter(|(id, _)| **id != session_id)
            .map(|(id, member)| MemberInfo {
                session_id: *id,
                user_id: member.user_id.clone(),
                position: member.position,
            })
            .collect()
    }
}

struct Room {
    state: Mutex<RoomState>,
}

impl Room {
    fn new(bounds: Bounds) -> Self {
        Self {
            state: Mutex::new(RoomState {
                bounds,
                members: BTreeMap::new(),
                joins: 0,
                evicted: false,
            }),
        }
    }

    /// Mark the room evicted if it has no members
    fn try_evict(&self) -> bool {
        let mut state = self.state.lock();
        if state.members.is_empty() {
            state.evicted = true;
            true
        } else {
            false
        }
    }
}

/// Process-wide mapping from space id to its live room
#[derive(Default)]
pub struct RoomRegistry {
    rooms: DashMap<String, Arc<Room>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn room(&self, space_id: &str) -> Option<Arc<Room>> {
        self.rooms.get(space_id).map(|entry| entry.value().clone())
    }

    /// Bounds for a space the directory still knows. A live room keeps the
    /// bounds it was opened with; otherwise the directory's answer is used.
    pub async fn resolve_bounds(
        &self,
        space_id: &str,
        directory: &dyn SpaceDirectory,
    ) -> Result<Bounds, PresenceError> {
        let layout = directory
            .get_space(space_id)
            .await?
            .ok_or_else(|| PresenceError::SpaceNotFound(space_id.to_string()))?;
        Ok(self.bounds(space_id).unwrap_or(layout.bounds))
    }

    /// Admit a session into the room for `space_id`.
    ///
    /// `bounds` is used only if this join opens the room. The joiner's
    /// `space-joined` acknowledgment is queued before the session becomes
    /// visible to anyone else, then `user-joined` goes to the other members.
    pub fn join(
        &self,
        space_id: &str,
        bounds: Bounds,
        session_id: SessionId,
        user_id: &str,
        outbox: Outbox,
    ) -> JoinOutcome {
        loop {
            let room = self
                .rooms
                .entry(space_id.to_string())
                .or_insert_with(|| {
                    info!("Opening room {} ({}x{})", space_id, bounds.width, bounds.height);
                    Arc::new(Room::new(bounds))
                })
                .value()
                .clone();

            let mut state = room.state.lock();
            if state.evicted {
                // lost a race with the last leave; the entry is gone now
                continue;
            }

            if let Some(member) = state.members.get(&session_id) {
                return JoinOutcome {
                    spawn: member.position,
                    bounds: state.bounds,
                    others: state.others(session_id),
                };
            }

            let spawn = spawn_point(state.joins, state.bounds);
            state.joins += 1;
            let others = state.others(session_id);

            let ack = ServerMessage::SpaceJoined {
                spawn,
                users: others
                    .iter()
                    .map(|m| UserPosition {
                        user_id: m.user_id.clone(),
                        position: m.position,
                    })
                    .collect(),
            };
            if outbox.send(ack).is_err() {
                debug!("Joiner {} closed before acknowledgment", session_id);
            }

            state.members.insert(
                session_id,
                Member {
                    user_id: user_id.to_string(),
                    position: spawn,
                    outbox,
                },
            );
            state.broadcast(
                &ServerMessage::UserJoined {
                    user_id: user_id.to_string(),
                    x: spawn.x,
                    y: spawn.y,
                },
                Some(session_id),
            );

            debug!(
                "Session {} ({}) joined {} at {}",
                session_id, user_id, space_id, spawn
            );

            return JoinOutcome {
                spawn,
                bounds: state.bounds,
                others,
            };
        }
    }

    /// Remove a session from its room and tell the remaining members.
    ///
    /// Returns false (and does nothing) if the session was not a member.
    pub fn leave(&self, space_id: &str, session_id: SessionId) -> bool {
        let Some(room) = self.room(space_id) else {
            return false;
        };

        let now_empty = {
            let mut state = room.state.lock();
            let Some(member) = state.members.remove(&session_id) else {
                return false;
            };
            state.broadcast(
                &ServerMessage::UserLeft {
                    user_id: member.user_id.clone(),
                },
                None,
            );
            debug!(
                "Session {} ({}) left {}",
                session_id, member.user_id, space_id
            );
            state.members.is_empty()
        };

        if now_empty
            && self
                .rooms
                .remove_if(space_id, |_, room| room.try_evict())
                .is_some()
        {
            info!("Closed empty room {}", space_id);
        }

        true
    }

    /// Validate and apply a move for a member, broadcasting accepted moves to
    /// the rest of the room. Fails with `NotJoined` if the session is not in
    /// the room.
    pub fn move_member(
        &self,
        space_id: &str,
        session_id: SessionId,
        requested: Position,
    ) -> Result<MoveOutcome, PresenceError> {
        let room = self.room(space_id).ok_or(PresenceError::NotJoined)?;
        let mut state = room.state.lock();
        let bounds = state.bounds;

        let member = state
            .members
            .get_mut(&session_id)
            .ok_or(PresenceError::NotJoined)?;

        match validate_move(member.position, requested, bounds) {
            MoveDecision::Accept(next) => {
                member.position = next;
                let event = ServerMessage::Movement {
                    user_id: member.user_id.clone(),
                    x: next.x,
                    y: next.y,
                };
                state.broadcast(&event, Some(session_id));
                Ok(MoveOutcome::Accepted(next))
            }
            MoveDecision::Reject(kept) => Ok(MoveOutcome::Rejected(kept)),
        }
    }

    /// Everyone in the room except `session_id`
    pub fn members_except(&self, space_id: &str, session_id: SessionId) -> Vec<MemberInfo> {
        self.room(space_id)
            .map(|room| room.state.lock().others(session_id))
            .unwrap_or_default()
    }

    /// Best-effort delivery to every member except `exclude`. Returns the
    /// number of members the event was queued for.
    pub fn broadcast(
        &self,
        space_id: &str,
        event: &ServerMessage,
        exclude: Option<SessionId>,
    ) -> usize {
        self.room(space_id)
            .map(|room| room.state.lock().broadcast(event, exclude))
            .unwrap_or(0)
    }

    /// Cached bounds of a live room
    pub fn bounds(&self, space_id: &str) -> Option<Bounds> {
        self.room(space_id).map(|room| room.state.lock().bounds)
    }

    /// Number of open rooms
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Number of sessions in a room
    pub fn member_count(&self, space_id: &str) -> usize {
        self.room(space_id)
            .map(|room| room.state.lock().members.len())
            .unwrap_or(0)
    }
}
