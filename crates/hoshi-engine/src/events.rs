//! Records delivered to the application's handlers.

use serde::Serialize;

use crate::parser::AnalysisReport;

/// Whole-board final-occupancy estimate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndstateReport {
    /// One row of values per board line, `+1.0` meaning Black territory.
    pub matrix: Vec<Vec<f64>>,
    /// Move count of the position the estimate belongs to.
    pub move_count: usize,
}

/// Something the engine told the session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Probing finished; the session accepts board updates.
    Ready,
    /// A fresh analysis pass.
    Suggestions(AnalysisReport),
    /// A completed endstate block.
    Endstate(EndstateReport),
}

/// Which optional records the application consumes.
///
/// Work whose only purpose is to produce an unwanted record is skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Interest {
    /// Analysis reports are consumed.
    pub suggestions: bool,
    /// Endstate reports are consumed.
    pub endstate: bool,
}

impl Interest {
    /// Interest in every record.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            suggestions: true,
            endstate: true,
        }
    }
}
