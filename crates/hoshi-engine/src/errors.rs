//! Error types surfaced by the engine session.

use std::io;
use std::sync::Arc;

use thiserror::Error;

/// Errors returned by [`crate::Session`] operations.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    /// The engine executable could not be found.
    #[error("engine binary not found: {command}")]
    BinaryNotFound {
        /// The command that was not found.
        command: String,
        /// The underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },

    /// The engine process could not be started.
    #[error("failed to spawn engine process: {message}")]
    SpawnFailed {
        /// Description of the spawn failure.
        message: String,
        /// The underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },

    /// An operation needs a running engine.
    #[error("engine is not running")]
    NotRunning,

    /// `restart` was called before any configuration was supplied.
    #[error("no engine configuration has been supplied")]
    NotConfigured,

    /// I/O failure while managing the process.
    #[error("engine I/O failed: {source}")]
    Io {
        /// The underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },
}

impl From<io::Error> for SessionError {
    fn from(source: io::Error) -> Self {
        Self::Io {
            source: Arc::new(source),
        }
    }
}

/// Why a running engine stopped being usable.
///
/// Delivered to the restart or error handler at most once per process.
#[derive(Debug, Clone, Error)]
pub enum ProcessFailure {
    /// The process ended without being killed by the session.
    #[error("engine exited unexpectedly{}", describe_status(*.code))]
    ExitedUnexpectedly {
        /// Exit code, if the process exited normally.
        code: Option<i32>,
    },

    /// Reading from or writing to a process stream failed.
    #[error("engine {stream} stream failed: {source}")]
    StreamError {
        /// Name of the failing stream.
        stream: &'static str,
        /// The underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },

    /// The engine rejected its weights file.
    #[error("engine reported an incompatible weights file")]
    IncompatibleWeights,
}

impl ProcessFailure {
    /// Whether the failure cannot be cured by restarting the same engine.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::IncompatibleWeights)
    }

    pub(crate) fn stream(stream: &'static str, source: io::Error) -> Self {
        Self::StreamError {
            stream,
            source: Arc::new(source),
        }
    }
}

fn describe_status(code: Option<i32>) -> String {
    code.map_or_else(String::new, |code| format!(" with status {code}"))
}
