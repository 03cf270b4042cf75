//! Movement validation and spawn placement
//!
//! Pure functions, no I/O. A move is legal only if it stays inside the
//! space and covers exactly one cell along exactly one axis.

use super::{Bounds, Position};

/// Outcome of validating a requested move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDecision {
    /// The requested cell becomes the authoritative position
    Accept(Position),
    /// The current position is kept and echoed back to the requester
    Reject(Position),
}

impl MoveDecision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, MoveDecision::Accept(_))
    }

    /// Authoritative position after the decision
    pub fn position(&self) -> Position {
        match self {
            MoveDecision::Accept(p) | MoveDecision::Reject(p) => *p,
        }
    }
}

/// Validate a move from `current` to `requested` inside `bounds`.
///
/// Rejects anything outside `[0, width) x [0, height)`, and anything that is
/// not a single orthogonal step: zero-length, diagonal and multi-cell moves
/// are all refused.
pub fn validate_move(current: Position, requested: Position, bounds: Bounds) -> MoveDecision {
    if !bounds.contains(requested) {
        return MoveDecision::Reject(current);
    }

    let dx = current.x.abs_diff(requested.x);
    let dy = current.y.abs_diff(requested.y);

    match (dx, dy) {
        (1, 0) | (0, 1) => MoveDecision::Accept(requested),
        _ => MoveDecision::Reject(current),
    }
}

/// Spawn cell for the `n`th join into a room.
///
/// Walks the grid row by row and wraps once every cell has been handed out,
/// so the result is always inside `bounds`.
pub fn spawn_point(n: u64, bounds: Bounds) -> Position {
    let area = bounds.area();
    if area == 0 {
        return Position::new(0, 0);
    }
    let width = bounds.width as u64;
    let cell = n % area;
    Position::new((cell % width) as i64, (cell / width) as i64)
}
