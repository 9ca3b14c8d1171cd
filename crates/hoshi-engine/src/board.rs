//! Move history types and the diff planner that keeps the engine's board in
//! step with the application's.
//!
//! The engine is never sent a full game. Instead, [`plan_sync`] compares the
//! history the engine is believed to hold with the desired one and yields the
//! undo/play steps that turn the first into the second.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stone colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    /// The first player.
    Black,
    /// The second player.
    White,
}

impl Color {
    /// Returns the opposing colour.
    #[must_use]
    pub const fn opponent(self) -> Self {
        match self {
            Self::Black => Self::White,
            Self::White => Self::Black,
        }
    }

    /// Protocol abbreviation (`b` or `w`).
    #[must_use]
    pub const fn as_protocol(self) -> &'static str {
        match self {
            Self::Black => "b",
            Self::White => "w",
        }
    }

    /// Multiplier that orients side-to-move values towards Black.
    #[must_use]
    pub const fn sign(self) -> f64 {
        match self {
            Self::Black => 1.0,
            Self::White => -1.0,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_protocol())
    }
}

/// A single played move: a protocol vertex (`D4`, `pass`) and its colour.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Move {
    /// Vertex in engine notation.
    pub vertex: String,
    /// Colour of the stone.
    pub color: Color,
}

impl Move {
    /// Builds a move from a vertex and colour.
    #[must_use]
    pub fn new(vertex: impl Into<String>, color: Color) -> Self {
        Self {
            vertex: vertex.into(),
            color,
        }
    }

    /// Shorthand for a black move.
    #[must_use]
    pub fn black(vertex: impl Into<String>) -> Self {
        Self::new(vertex, Color::Black)
    }

    /// Shorthand for a white move.
    #[must_use]
    pub fn white(vertex: impl Into<String>) -> Self {
        Self::new(vertex, Color::White)
    }

    /// The `play` command placing this move.
    #[must_use]
    pub fn play_command(&self) -> String {
        format!("play {} {}", self.color, self.vertex)
    }
}

/// Local turn bookkeeping carried through the command queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TurnState {
    /// Number of moves on the board.
    pub move_count: usize,
    /// Colour whose turn it is.
    pub to_move: Color,
}

impl TurnState {
    /// Turn state of an empty board.
    #[must_use]
    pub const fn initial() -> Self {
        Self {
            move_count: 0,
            to_move: Color::Black,
        }
    }

    /// Turn state after `history` has been played.
    #[must_use]
    pub fn after(history: &[Move]) -> Self {
        let to_move = history
            .last()
            .map_or(Color::Black, |last| last.color.opponent());
        Self {
            move_count: history.len(),
            to_move,
        }
    }
}

impl Default for TurnState {
    fn default() -> Self {
        Self::initial()
    }
}

/// Steps needed to bring the engine's board to the desired history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncPlan {
    /// Desired history is empty; the board is cleared.
    Clear,
    /// Undo `undo` stones, then play `play` in order.
    Replay {
        /// Number of stones to take back.
        undo: usize,
        /// Moves to place after the undos.
        play: Vec<Move>,
    },
}

impl SyncPlan {
    /// Protocol commands realising this plan.
    #[must_use]
    pub fn commands(&self) -> Vec<String> {
        match self {
            Self::Clear => vec![String::from("clear_board")],
            Self::Replay { undo, play } => std::iter::repeat_n(String::from("undo"), *undo)
                .chain(play.iter().map(Move::play_command))
                .collect(),
        }
    }

    /// Whether applying the plan changes nothing.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        matches!(self, Self::Replay { undo: 0, play } if play.is_empty())
    }
}

/// Length of the shared prefix between two histories.
#[must_use]
pub fn common_prefix_len(left: &[Move], right: &[Move]) -> usize {
    left.iter()
        .zip(right)
        .take_while(|(a, b)| a == b)
        .count()
}

/// Plans the minimal undo/play replay from `mirror` to `target`.
#[must_use]
pub fn plan_sync(mirror: &[Move], target: &[Move]) -> SyncPlan {
    if target.is_empty() {
        return SyncPlan::Clear;
    }
    let shared = common_prefix_len(mirror, target);
    SyncPlan::Replay {
        undo: mirror.len() - shared,
        play: target.iter().skip(shared).cloned().collect(),
    }
}
