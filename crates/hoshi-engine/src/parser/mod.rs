//! Classification and parsing of engine output.
//!
//! Every line read from the engine is first mapped to a closed set of line
//! kinds; the dispatcher reacts to the kind and hands analysis or block lines
//! to the dedicated parsers in [`suggest`] and [`endstate`]. Lines that match
//! no known shape are classified as [`StdoutLine::Other`] or
//! [`StatusLine::Other`] and ignored by callers.

pub mod endstate;
pub mod suggest;

pub use endstate::{BlockLine, EndstateBlock, classify_block_line};
pub use suggest::{AnalysisContext, AnalysisReport, Dialect, Suggestion, parse_analysis_line};

/// Kinds of line found on the engine's standard output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StdoutLine<'a> {
    /// `=<id>` or `?<id>`: the response to a numbered command.
    Response {
        /// Id of the answered command.
        id: i64,
        /// `true` for `=`, `false` for `?`.
        success: bool,
    },
    /// An unsolicited analysis report (`info ...`).
    Analysis(&'a str),
    /// Anything else.
    Other,
}

/// Classifies one standard-output line.
#[must_use]
pub fn classify_stdout(line: &str) -> StdoutLine<'_> {
    if let Some(response) = parse_response(line) {
        return response;
    }
    if line.starts_with("info ") {
        return StdoutLine::Analysis(line);
    }
    StdoutLine::Other
}

fn parse_response(line: &str) -> Option<StdoutLine<'_>> {
    let mut chars = line.chars();
    let success = match chars.next()? {
        '=' => true,
        '?' => false,
        _ => return None,
    };
    let digits: String = chars.take_while(char::is_ascii_digit).collect();
    let id = digits.parse().ok()?;
    Some(StdoutLine::Response { id, success })
}

/// Kinds of free-text status line found on the engine's standard error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatusLine {
    /// Network shape announced while loading weights.
    NetworkSize {
        /// Filters per residual layer.
        channels: u32,
        /// Residual block count.
        blocks: u32,
    },
    /// The engine accepts commands.
    Ready,
    /// The weights file cannot be used by this engine build.
    IncompatibleWeights,
    /// Raw network evaluation of the current position.
    Evaluation(f64),
    /// An endstate block follows.
    EndstateStart,
    /// Anything else.
    Other,
}

/// Classifies one standard-error line read outside a block.
#[must_use]
pub fn classify_status(line: &str) -> StatusLine {
    if let Some((channels, blocks)) = parse_network_size(line) {
        return StatusLine::NetworkSize { channels, blocks };
    }
    if line.contains("Setting max tree size") || line.contains("GTP ready") {
        return StatusLine::Ready;
    }
    if line.contains("Weights file is the wrong version") {
        return StatusLine::IncompatibleWeights;
    }
    if let Some(value) = parse_evaluation(line) {
        return StatusLine::Evaluation(value);
    }
    if line.contains("endstate:") {
        return StatusLine::EndstateStart;
    }
    StatusLine::Other
}

fn parse_network_size(line: &str) -> Option<(u32, u32)> {
    let (_, rest) = line.split_once("Detecting residual layers")?;
    let (channels, rest) = number_before(rest, " channels")?;
    let (blocks, _) = number_before(rest, " blocks")?;
    Some((channels, blocks))
}

/// Finds the first `<digits><marker>` in `text`, returning the number and
/// the text after the marker.
fn number_before<'a>(text: &'a str, marker: &str) -> Option<(u32, &'a str)> {
    text.match_indices(marker).find_map(|(index, _)| {
        let (head, tail) = text.split_at(index);
        let digits: String = head
            .chars()
            .rev()
            .take_while(char::is_ascii_digit)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        let value = digits.parse().ok()?;
        let rest = tail.strip_prefix(marker)?;
        Some((value, rest))
    })
}

fn parse_evaluation(line: &str) -> Option<f64> {
    let (_, rest) = line.split_once("NN eval=")?;
    let number: String = rest
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    number.parse().ok()
}
