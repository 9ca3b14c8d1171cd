//! Parsing of `info` analysis lines into ranked suggestions.
//!
//! A single line holds every candidate move of one analysis pass:
//!
//! ```text
//! info move D16 visits 23 winrate 4668 prior 2171 order 0 pv D16 Q16 info move D4 ...
//! ```
//!
//! The alternate dialect adds score estimates per record and an `ownership`
//! section covering the whole board at the end of the line.

use std::collections::HashMap;

use serde::Serialize;

use crate::board::Color;

/// Output dialect, which decides how percentages are encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    /// Percentages in hundredths of a percent (`4668` is 46.68%).
    #[default]
    Native,
    /// Percentages as fractions (`0.4668` is 46.68%) with score estimates.
    Alternate,
}

impl Dialect {
    /// Converts a raw percentage token into percent.
    #[must_use]
    pub fn to_percent(self, raw: f64) -> f64 {
        match self {
            Self::Native => raw / 100.0,
            Self::Alternate => raw * 100.0,
        }
    }
}

/// Position-dependent values needed to interpret an analysis line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalysisContext {
    /// Encoding of the line.
    pub dialect: Dialect,
    /// Side to move in the analysed position.
    pub to_move: Color,
    /// Komi added back to score estimates.
    pub komi: f64,
}

/// One candidate move from an analysis pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    /// Candidate vertex.
    #[serde(rename = "move")]
    pub vertex: String,
    /// Playouts spent on the candidate.
    pub visits: u64,
    /// Win probability for the side to move, in percent.
    pub winrate: f64,
    /// Lower confidence bound of the win probability, in percent.
    pub lcb: f64,
    /// Policy prior as a fraction.
    pub prior: f64,
    /// Rank reported by the engine.
    pub order: u32,
    /// Rank by descending visits.
    pub visits_order: usize,
    /// Rank by descending win probability.
    pub winrate_order: usize,
    /// Principal variation starting with `vertex`.
    pub pv: Vec<String>,
    /// Board-relative score lead for Black before komi, when reported.
    pub score_without_komi: Option<f64>,
    /// Standard deviation of the score estimate.
    pub score_stdev: f64,
}

/// Everything one analysis line yields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    /// Suggestions in native engine order.
    pub suggestions: Vec<Suggestion>,
    /// Total visits across suggestions.
    pub visits: u64,
    /// Visit-weighted win probability for the side to move.
    pub winrate: Option<f64>,
    /// [`AnalysisReport::winrate`] seen from Black.
    pub black_winrate: Option<f64>,
    /// Visit-weighted score estimate; alternate dialect only.
    pub score_without_komi: Option<f64>,
    /// Search speed; populated by the session from its rate estimator.
    pub visits_per_sec: Option<f64>,
    /// Per-point ownership oriented towards Black, if present.
    pub ownership: Option<Vec<f64>>,
}

/// Parses a complete `info ...` line.
#[must_use]
pub fn parse_analysis_line(line: &str, context: &AnalysisContext) -> AnalysisReport {
    let (records, ownership) = line
        .split_once("ownership")
        .map_or((line, None), |(records, section)| {
            (records, parse_ownership(section, context.to_move))
        });

    let tokens: Vec<&str> = records.split_whitespace().collect();
    let mut suggestions: Vec<Suggestion> = tokens
        .split(|token| *token == "info")
        .skip(1)
        .enumerate()
        .filter_map(|(position, record)| parse_record(record, position, context))
        .collect();
    suggestions.sort_by_key(|suggestion| suggestion.order);
    assign_secondary_ranks(&mut suggestions);

    let visits: u64 = suggestions.iter().map(|s| s.visits).sum();
    let winrate = weighted_mean(&suggestions, visits, |s| s.winrate);
    let score_without_komi = match context.dialect {
        Dialect::Alternate => weighted_mean(&suggestions, visits, |s| {
            s.score_without_komi.unwrap_or(0.0)
        }),
        Dialect::Native => None,
    };
    let black_winrate = winrate.map(|value| match context.to_move {
        Color::Black => value,
        Color::White => 100.0 - value,
    });

    AnalysisReport {
        suggestions,
        visits,
        winrate,
        black_winrate,
        score_without_komi,
        visits_per_sec: None,
        ownership,
    }
}

fn parse_record(record: &[&str], position: usize, context: &AnalysisContext) -> Option<Suggestion> {
    let pv_at = record.iter().position(|token| *token == "pv")?;
    let (fields, pv) = record.split_at(pv_at);
    let pairs: HashMap<&str, &str> = fields
        .chunks_exact(2)
        .filter_map(|pair| match pair {
            [key, value] => Some((*key, *value)),
            _ => None,
        })
        .collect();

    let vertex = (*pairs.get("move")?).to_owned();
    let number = |key: &str| pairs.get(key).and_then(|value| value.parse::<f64>().ok());
    let percent = |key: &str| number(key).map(|raw| context.dialect.to_percent(raw));

    let winrate = percent("winrate").unwrap_or(0.0);
    let score_without_komi = number("scoreMean")
        .map(|mean| mean * context.to_move.sign() + context.komi);

    Some(Suggestion {
        vertex,
        visits: pairs
            .get("visits")
            .and_then(|value| value.parse().ok())
            .unwrap_or(0),
        winrate,
        lcb: percent("lcb").unwrap_or(winrate),
        prior: percent("prior").unwrap_or(0.0) / 100.0,
        order: pairs
            .get("order")
            .and_then(|value| value.parse().ok())
            .unwrap_or_else(|| u32::try_from(position).unwrap_or(u32::MAX)),
        visits_order: 0,
        winrate_order: 0,
        pv: pv.iter().skip(1).map(|vertex| (*vertex).to_owned()).collect(),
        score_without_komi,
        score_stdev: number("scoreStdev").unwrap_or(0.0),
    })
}

fn parse_ownership(section: &str, to_move: Color) -> Option<Vec<f64>> {
    let values: Vec<f64> = section
        .split_whitespace()
        .filter_map(|token| token.parse::<f64>().ok())
        .map(|value| value * to_move.sign())
        .collect();
    (!values.is_empty()).then_some(values)
}

fn assign_secondary_ranks(suggestions: &mut [Suggestion]) {
    let mut by_visits: Vec<usize> = (0..suggestions.len()).collect();
    by_visits.sort_by(|&a, &b| visits_of(suggestions, b).cmp(&visits_of(suggestions, a)));
    let mut by_winrate: Vec<usize> = (0..suggestions.len()).collect();
    by_winrate.sort_by(|&a, &b| winrate_of(suggestions, b).total_cmp(&winrate_of(suggestions, a)));

    for (rank, index) in by_visits.into_iter().enumerate() {
        if let Some(suggestion) = suggestions.get_mut(index) {
            suggestion.visits_order = rank;
        }
    }
    for (rank, index) in by_winrate.into_iter().enumerate() {
        if let Some(suggestion) = suggestions.get_mut(index) {
            suggestion.winrate_order = rank;
        }
    }
}

fn visits_of(suggestions: &[Suggestion], index: usize) -> u64 {
    suggestions.get(index).map_or(0, |s| s.visits)
}

fn winrate_of(suggestions: &[Suggestion], index: usize) -> f64 {
    suggestions.get(index).map_or(0.0, |s| s.winrate)
}

#[expect(
    clippy::cast_precision_loss,
    reason = "visit counts stay far below 2^52"
)]
fn weighted_mean(
    suggestions: &[Suggestion],
    total_visits: u64,
    value: impl Fn(&Suggestion) -> f64,
) -> Option<f64> {
    if total_visits == 0 {
        return None;
    }
    let sum: f64 = suggestions
        .iter()
        .map(|s| value(s) * s.visits as f64)
        .sum();
    Some(sum / total_visits as f64)
}
