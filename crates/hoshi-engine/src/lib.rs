//! Session management for GTP analysis engines in the Leela Zero family.
//!
//! The crate keeps a long-lived engine process in step with the
//! application's game: it mirrors the engine's board and replays only the
//! moves that differ, serialises commands so that no response can be
//! confused with another, negotiates optional engine features at startup,
//! and turns the engine's free-form output into structured analysis
//! records.
//!
//! [`Session`] is the entry point. [`EngineCore`] holds the protocol state
//! machine without any process attached, which is how most of the crate is
//! tested.

mod board;
mod capability;
mod config;
mod dispatcher;
mod errors;
mod events;
mod framer;
mod logging;
pub mod parser;
mod process;
mod queue;
mod scheduler;
mod session;
mod speedometer;

pub use board::{Color, Move, SyncPlan, TurnState, common_prefix_len, plan_sync};
pub use capability::{CapabilityMap, Feature, FeatureProber};
pub use config::EngineConfig;
pub use dispatcher::{CommandWriter, Effect, EngineCore, EvaluationContinuation, InFlight};
pub use errors::{ProcessFailure, SessionError};
pub use events::{EndstateReport, Interest, SessionEvent};
pub use framer::LineFramer;
pub use logging::snip;
pub use parser::{AnalysisReport, Dialect, Suggestion};
pub use queue::{CommandQueue, QueueEntry, join_commands, split_commands};
pub use scheduler::{Debouncer, UPDATE_DEBOUNCE};
pub use session::{Session, SessionHandlers};
pub use speedometer::{RATE_PREMATURE, RATE_WINDOW, RateEstimator};

#[cfg(test)]
mod tests;
