//! Multi-line endstate blocks.
//!
//! After `endstate:` the engine prints one row of integers per board line,
//! each the estimated final occupancy in thousandths, and closes the block
//! with an `endstate sum` line.

/// Scale of the integers printed in a block row.
pub const ENDSTATE_SCALE: f64 = 1000.0;

/// Kinds of line seen inside an endstate block.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockLine {
    /// A row of scaled values.
    Row(Vec<f64>),
    /// The terminator.
    End,
    /// A line without numeric content.
    Ignored,
}

/// Classifies one line read while a block is open.
#[must_use]
pub fn classify_block_line(line: &str) -> BlockLine {
    if line.contains("endstate sum") {
        return BlockLine::End;
    }
    let values: Option<Vec<f64>> = line
        .split_whitespace()
        .map(|token| token.parse::<i32>().ok().map(|raw| f64::from(raw) / ENDSTATE_SCALE))
        .collect();
    match values {
        Some(row) if !row.is_empty() => BlockLine::Row(row),
        _ => BlockLine::Ignored,
    }
}

/// Accumulates block rows until the terminator arrives.
#[derive(Debug, Default)]
pub struct EndstateBlock {
    rows: Vec<Vec<f64>>,
}

impl EndstateBlock {
    /// Opens an empty block.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one line; returns the completed matrix on the terminator.
    pub fn feed(&mut self, line: &str) -> Option<Vec<Vec<f64>>> {
        match classify_block_line(line) {
            BlockLine::Row(row) => {
                self.rows.push(row);
                None
            }
            BlockLine::End => Some(std::mem::take(&mut self.rows)),
            BlockLine::Ignored => None,
        }
    }

    /// Rows collected so far.
    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows.len()
    }
}
