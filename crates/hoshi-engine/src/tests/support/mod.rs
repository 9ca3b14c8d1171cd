//! Shared fixtures and helpers for engine core tests.

mod recording_writer;

pub use recording_writer::{FailingWriter, RecordingWriter};

use crate::board::{Color, Move};
use crate::config::EngineConfig;
use crate::dispatcher::{Effect, EngineCore};
use crate::events::{Interest, SessionEvent};

/// Drives an [`EngineCore`] the way a scripted engine would.
pub struct CoreHarness {
    /// Core under test.
    pub core: EngineCore,
    writer: RecordingWriter,
    answered: usize,
    /// Effects collected from every call made through the harness.
    pub effects: Vec<Effect>,
}

impl CoreHarness {
    /// Harness with the default configuration and interest in every record.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::new("leelaz"), Interest::all())
    }

    /// Harness with explicit configuration and interest.
    pub fn with_config(config: EngineConfig, interest: Interest) -> Self {
        let writer = RecordingWriter::default();
        let core = EngineCore::new(Box::new(writer.clone()), config, interest, true);
        Self {
            core,
            writer,
            answered: 0,
            effects: Vec::new(),
        }
    }

    /// Runs startup and answers the probes with the given outcomes.
    pub fn boot(&mut self, minmoves: bool, endstate: bool, kata: bool) {
        let effects = self.core.start();
        self.effects.extend(effects);
        self.stderr("GTP ready");
        self.respond(true);
        for supported in [minmoves, endstate, kata] {
            self.respond(supported);
        }
    }

    /// Feeds a stdout line.
    pub fn stdout(&mut self, line: &str) {
        let effects = self.core.handle_stdout(line);
        self.effects.extend(effects);
    }

    /// Feeds a stderr line.
    pub fn stderr(&mut self, line: &str) {
        let effects = self.core.handle_stderr(line);
        self.effects.extend(effects);
    }

    /// Answers the oldest unanswered command.
    pub fn respond(&mut self, success: bool) {
        let lines = self.writer.lines();
        let line = lines
            .get(self.answered)
            .unwrap_or_else(|| panic!("no unanswered command; sent: {lines:?}"));
        let id = line
            .split_whitespace()
            .next()
            .unwrap_or_else(|| panic!("malformed command line {line:?}"));
        self.answered += 1;
        let marker = if success { '=' } else { '?' };
        self.stdout(&format!("{marker}{id}"));
    }

    /// Answers commands until nothing is outstanding.
    pub fn settle(&mut self) {
        while self.answered < self.writer.lines().len() {
            self.respond(true);
        }
    }

    /// Sets the board and settles every resulting command.
    pub fn play_through(&mut self, history: &[Move]) {
        let effects = self.core.set_board(history);
        self.effects.extend(effects);
        self.settle();
    }

    /// Every line written so far, ids included.
    pub fn lines(&self) -> Vec<String> {
        self.writer.lines()
    }

    /// Every command written so far, ids stripped.
    pub fn commands(&self) -> Vec<String> {
        self.writer.commands()
    }

    /// Commands written after the first `skip`.
    pub fn commands_after(&self, skip: usize) -> Vec<String> {
        self.commands().into_iter().skip(skip).collect()
    }

    /// Events collected so far, in order.
    pub fn events(&self) -> Vec<&SessionEvent> {
        self.effects
            .iter()
            .filter_map(|effect| match effect {
                Effect::Event(event) => Some(event),
                _ => None,
            })
            .collect()
    }

    /// Drops collected effects.
    pub fn clear_effects(&mut self) {
        self.effects.clear();
    }
}

/// Builds a history of alternating colours starting with Black.
pub fn alternating(vertices: &[&str]) -> Vec<Move> {
    vertices
        .iter()
        .enumerate()
        .map(|(index, vertex)| {
            let color = if index % 2 == 0 {
                Color::Black
            } else {
                Color::White
            };
            Move::new(*vertex, color)
        })
        .collect()
}
