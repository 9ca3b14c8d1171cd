//! Engine subprocess management.
//!
//! [`spawn`] starts the engine with all three standard streams piped and
//! hands them back separately: standard input becomes the core's command
//! writer, the two output streams are drained by [`spawn_reader`] threads.
//! [`EngineProcess`] owns the child and kills it when dropped.

mod reader;

use std::io;
use std::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command, ExitStatus, Stdio};
use std::sync::Arc;

use tracing::{debug, warn};

pub use reader::{OutputStream, ReaderEnd, spawn_reader};

use crate::config::EngineConfig;
use crate::errors::SessionError;
use crate::logging::PROCESS_TARGET;

/// Handle to a running engine.
#[derive(Debug)]
pub struct EngineProcess {
    child: Child,
}

/// A freshly spawned engine and its detached streams.
#[derive(Debug)]
pub struct SpawnedEngine {
    /// Process handle.
    pub process: EngineProcess,
    /// Command input.
    pub stdin: ChildStdin,
    /// Responses and analysis.
    pub stdout: ChildStdout,
    /// Status text and data blocks.
    pub stderr: ChildStderr,
}

/// Spawns the engine described by `config`.
///
/// # Errors
///
/// Returns [`SessionError::BinaryNotFound`] when the executable does not
/// exist and [`SessionError::SpawnFailed`] for any other spawn failure.
pub fn spawn(config: &EngineConfig) -> Result<SpawnedEngine, SessionError> {
    debug!(
        target: PROCESS_TARGET,
        command = %config.command.display(),
        args = ?config.args,
        "spawning engine process"
    );

    let mut command = Command::new(&config.command);
    command
        .args(&config.args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = &config.working_dir {
        command.current_dir(dir);
    }

    let mut child = command.spawn().map_err(|error| {
        if error.kind() == io::ErrorKind::NotFound {
            SessionError::BinaryNotFound {
                command: config.command.display().to_string(),
                source: Arc::new(error),
            }
        } else {
            SessionError::SpawnFailed {
                message: format!("failed to start {}", config.command.display()),
                source: Arc::new(error),
            }
        }
    })?;

    let stdin = child.stdin.take().ok_or_else(|| missing_pipe("stdin"))?;
    let stdout = child.stdout.take().ok_or_else(|| missing_pipe("stdout"))?;
    let stderr = child.stderr.take().ok_or_else(|| missing_pipe("stderr"))?;

    debug!(target: PROCESS_TARGET, pid = child.id(), "engine process spawned");

    Ok(SpawnedEngine {
        process: EngineProcess { child },
        stdin,
        stdout,
        stderr,
    })
}

fn missing_pipe(stream: &str) -> SessionError {
    SessionError::SpawnFailed {
        message: format!("failed to capture {stream}"),
        source: Arc::new(io::Error::other(format!("no {stream}"))),
    }
}

impl EngineProcess {
    /// Operating-system process id.
    #[must_use]
    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Exit status if the process has already ended.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the status cannot be queried.
    pub fn try_wait(&mut self) -> io::Result<Option<ExitStatus>> {
        self.child.try_wait()
    }

    /// Forcibly terminates the process and reaps it.
    pub fn kill(&mut self) {
        let pid = self.child.id();
        match self.child.kill() {
            Ok(()) => {
                if let Err(error) = self.child.wait() {
                    warn!(target: PROCESS_TARGET, pid, %error, "failed to reap engine process");
                } else {
                    debug!(target: PROCESS_TARGET, pid, "engine process killed");
                }
            }
            // Already exited; only the zombie is left to reap.
            Err(error) if error.kind() == io::ErrorKind::InvalidInput => {
                if let Err(error) = self.child.try_wait() {
                    debug!(target: PROCESS_TARGET, pid, %error, "failed to reap exited engine");
                }
            }
            Err(error) => {
                warn!(target: PROCESS_TARGET, pid, %error, "failed to kill engine process");
            }
        }
    }
}

impl Drop for EngineProcess {
    fn drop(&mut self) {
        if matches!(self.child.try_wait(), Ok(None)) {
            self.kill();
        }
    }
}
