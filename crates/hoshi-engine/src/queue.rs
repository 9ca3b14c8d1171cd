//! Pending command queue with its pruning rules.
//!
//! Entries wait here until the dispatcher is allowed to send. Before a new
//! entry is appended, queued entries that it makes pointless are dropped:
//! analysis starts are always superseded, repeated endstate queries collapse
//! into one, and board changes invalidate queued endstate queries and peeks.

use std::collections::VecDeque;
use std::fmt;

use crate::board::TurnState;

/// Separator joining the parts of an atomic multi-part command.
pub const COMMAND_SEPARATOR: char = ';';

/// Joins command parts so they are dispatched together.
#[must_use]
pub fn join_commands<I, S>(parts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    parts
        .into_iter()
        .map(|part| part.as_ref().to_owned())
        .collect::<Vec<_>>()
        .join(";")
}

/// Splits a queued command into the lines actually sent.
pub fn split_commands(text: &str) -> impl Iterator<Item = &str> {
    text.split(COMMAND_SEPARATOR)
}

/// Whether the command starts continuous analysis.
#[must_use]
pub fn is_analysis_command(text: &str) -> bool {
    text.starts_with("lz-analyze") || text.starts_with("kata-analyze")
}

/// Whether the command is the whole-board endstate query.
#[must_use]
pub fn is_endstate_command(text: &str) -> bool {
    text.starts_with("endstate_map")
}

/// Whether the command plays a stone and later takes it back.
#[must_use]
pub fn is_peek_command(text: &str) -> bool {
    text.split_once("play")
        .is_some_and(|(_, rest)| rest.contains("undo"))
}

/// Whether the command changes the engine's board.
#[must_use]
pub fn mutates_board(text: &str) -> bool {
    ["play", "undo", "clear_board"]
        .iter()
        .any(|keyword| text.contains(keyword))
}

/// One queued item.
#[derive(Debug, Clone, PartialEq)]
pub enum QueueEntry {
    /// Text to send, possibly several parts joined by [`COMMAND_SEPARATOR`].
    Command(String),
    /// Local turn bookkeeping applied when the entry reaches the front.
    TurnMarker(TurnState),
}

impl QueueEntry {
    fn command(&self) -> Option<&str> {
        match self {
            Self::Command(text) => Some(text),
            Self::TurnMarker(_) => None,
        }
    }

    fn matches(&self, predicate: fn(&str) -> bool) -> bool {
        self.command().is_some_and(predicate)
    }
}

impl fmt::Display for QueueEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Command(text) => f.write_str(text),
            Self::TurnMarker(turn) => write!(
                f,
                "<turn {} {}>",
                turn.move_count,
                turn.to_move.as_protocol()
            ),
        }
    }
}

/// FIFO of entries awaiting dispatch.
#[derive(Debug, Clone, Default)]
pub struct CommandQueue {
    entries: VecDeque<QueueEntry>,
}

impl CommandQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies the pruning rules for `entry`, then appends it.
    pub fn push(&mut self, entry: QueueEntry) {
        self.remove(is_analysis_command);
        if entry.matches(is_endstate_command) {
            self.remove(is_endstate_command);
        }
        if entry.matches(mutates_board) {
            self.remove(is_endstate_command);
            self.remove(is_peek_command);
        }
        self.entries.push_back(entry);
    }

    /// Removes and returns the front entry.
    pub fn pop(&mut self) -> Option<QueueEntry> {
        self.entries.pop_front()
    }

    /// Number of queued entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over queued entries, front first.
    pub fn iter(&self) -> impl Iterator<Item = &QueueEntry> {
        self.entries.iter()
    }

    fn remove(&mut self, predicate: fn(&str) -> bool) {
        self.entries.retain(|entry| !entry.matches(predicate));
    }
}

impl fmt::Display for CommandQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (index, entry) in self.entries.iter().enumerate() {
            if index > 0 {
                f.write_str(",")?;
            }
            write!(f, "{entry}")?;
        }
        f.write_str("]")
    }
}
