//! The session facade: the only surface the application talks to.
//!
//! A [`Session`] supervises at most one engine process at a time. Requests
//! lock the protocol state, let the [`EngineCore`] react, and then run the
//! resulting effects (handler calls, debounced updates, failure reports)
//! after the lock has been released, so handlers may call back into the
//! session freely.
//!
//! Each process start is tagged with a generation number. Reader threads
//! and debounced updates carry the generation they were created for and are
//! ignored once the session has moved on, which is how `kill` detaches the
//! old process's streams.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::board::Move;
use crate::capability::CapabilityMap;
use crate::config::EngineConfig;
use crate::dispatcher::{Effect, EngineCore};
use crate::errors::{ProcessFailure, SessionError};
use crate::events::{EndstateReport, Interest, SessionEvent};
use crate::logging::SESSION_TARGET;
use crate::parser::AnalysisReport;
use crate::process::{self, EngineProcess, OutputStream, ReaderEnd};
use crate::scheduler::Debouncer;

/// Polls for the exit status after standard output closes.
const EXIT_POLL_ATTEMPTS: u32 = 20;
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

type ReadyHandler = Box<dyn Fn(&Session) + Send + Sync>;
type SuggestHandler = Box<dyn Fn(&AnalysisReport) + Send + Sync>;
type EndstateHandler = Box<dyn Fn(&EndstateReport) + Send + Sync>;
type FailureHandler = Box<dyn Fn(&Session, &ProcessFailure) + Send + Sync>;

/// Application callbacks, bound once per [`Session`].
///
/// Omitting the suggestion or endstate handler also stops the session from
/// requesting that data.
#[derive(Default)]
pub struct SessionHandlers {
    ready: Option<ReadyHandler>,
    suggest: Option<SuggestHandler>,
    endstate: Option<EndstateHandler>,
    restart: Option<FailureHandler>,
    error: Option<FailureHandler>,
}

impl SessionHandlers {
    /// No handlers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Called once probing has finished after each start.
    #[must_use]
    pub fn on_ready(mut self, handler: impl Fn(&Session) + Send + Sync + 'static) -> Self {
        self.ready = Some(Box::new(handler));
        self
    }

    /// Called with every analysis report.
    #[must_use]
    pub fn on_suggest(mut self, handler: impl Fn(&AnalysisReport) + Send + Sync + 'static) -> Self {
        self.suggest = Some(Box::new(handler));
        self
    }

    /// Called with every endstate report.
    #[must_use]
    pub fn on_endstate(
        mut self,
        handler: impl Fn(&EndstateReport) + Send + Sync + 'static,
    ) -> Self {
        self.endstate = Some(Box::new(handler));
        self
    }

    /// Called when the engine exits unexpectedly or a stream fails.
    #[must_use]
    pub fn on_restart(
        mut self,
        handler: impl Fn(&Session, &ProcessFailure) + Send + Sync + 'static,
    ) -> Self {
        self.restart = Some(Box::new(handler));
        self
    }

    /// Called for fatal engine errors; falls back to the restart handler.
    #[must_use]
    pub fn on_error(
        mut self,
        handler: impl Fn(&Session, &ProcessFailure) + Send + Sync + 'static,
    ) -> Self {
        self.error = Some(Box::new(handler));
        self
    }

    fn interest(&self) -> Interest {
        Interest {
            suggestions: self.suggest.is_some(),
            endstate: self.endstate.is_some(),
        }
    }

    fn failure_handler(&self, failure: &ProcessFailure) -> Option<&FailureHandler> {
        if failure.is_fatal() {
            self.error.as_ref().or(self.restart.as_ref())
        } else {
            self.restart.as_ref()
        }
    }
}

impl fmt::Debug for SessionHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandlers")
            .field("ready", &self.ready.is_some())
            .field("suggest", &self.suggest.is_some())
            .field("endstate", &self.endstate.is_some())
            .field("restart", &self.restart.is_some())
            .field("error", &self.error.is_some())
            .finish()
    }
}

struct Running {
    core: EngineCore,
    process: EngineProcess,
    generation: u64,
    failure_reported: bool,
    open_readers: usize,
    stdout_closed: bool,
}

struct SessionState {
    config: Option<EngineConfig>,
    pondering: bool,
    running: Option<Running>,
}

struct Inner {
    state: Mutex<SessionState>,
    handlers: SessionHandlers,
    interest: Interest,
    generation: AtomicU64,
    debouncer: Debouncer,
}

/// Long-lived connection to an analysis engine.
///
/// Clones share the same engine. Dropping the last clone kills the process.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl Session {
    /// Creates an idle session; call [`Session::start`] to spawn an engine.
    #[must_use]
    pub fn new(handlers: SessionHandlers) -> Self {
        let interest = handlers.interest();
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(SessionState {
                    config: None,
                    pondering: true,
                    running: None,
                }),
                handlers,
                interest,
                generation: AtomicU64::new(0),
                debouncer: Debouncer::default(),
            }),
        }
    }

    /// Spawns the engine, replacing any running one.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::BinaryNotFound`] or
    /// [`SessionError::SpawnFailed`] if the process cannot be started, and
    /// [`SessionError::Io`] if its output readers cannot be spawned.
    pub fn start(&self, config: EngineConfig) -> Result<(), SessionError> {
        self.kill();
        let spawned = process::spawn(&config)?;
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let pid = spawned.process.pid();

        let effects = {
            let mut state = self.inner.lock_state();
            let mut core = EngineCore::new(
                Box::new(spawned.stdin),
                config.clone(),
                self.inner.interest,
                state.pondering,
            );
            let effects = core.start();
            state.config = Some(config);
            state.running = Some(Running {
                core,
                process: spawned.process,
                generation,
                failure_reported: false,
                open_readers: 2,
                stdout_closed: false,
            });
            effects
        };
        info!(target: SESSION_TARGET, pid, generation, "engine session started");

        let readers = self
            .spawn_reader(OutputStream::Stdout, spawned.stdout, generation)
            .and_then(|_| self.spawn_reader(OutputStream::Stderr, spawned.stderr, generation));
        if let Err(error) = readers {
            self.kill();
            return Err(SessionError::from(error));
        }

        self.inner.apply(generation, effects);
        Ok(())
    }

    /// Kills the engine and starts it again, optionally with a new
    /// configuration. Handlers are kept.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotConfigured`] when no configuration was
    /// ever supplied, or any error [`Session::start`] returns.
    pub fn restart(&self, config: Option<EngineConfig>) -> Result<(), SessionError> {
        let config = config
            .or_else(|| self.inner.lock_state().config.clone())
            .ok_or(SessionError::NotConfigured)?;
        self.start(config)
    }

    /// Terminates the engine without reporting a failure. No-op when idle.
    pub fn kill(&self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        self.inner.debouncer.cancel();
        let running = self.inner.lock_state().running.take();
        if let Some(mut running) = running {
            info!(
                target: SESSION_TARGET,
                pid = running.process.pid(),
                generation = running.generation,
                "killing engine"
            );
            running.process.kill();
        }
    }

    /// Synchronises the engine's board with `history`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotRunning`] when no engine is running.
    pub fn set_board(&self, history: &[Move]) -> Result<(), SessionError> {
        self.inner
            .run(None, |core| core.set_board(history))
            .ok_or(SessionError::NotRunning)
    }

    /// Refreshes endstate and analysis for the current position.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotRunning`] when no engine is running.
    pub fn update(&self) -> Result<(), SessionError> {
        self.inner
            .run(None, EngineCore::update)
            .ok_or(SessionError::NotRunning)
    }

    /// Enables or disables continuous analysis.
    ///
    /// The setting is kept across restarts and applies to the next start
    /// when no engine is running.
    pub fn set_pondering(&self, pondering: bool) {
        self.inner.lock_state().pondering = pondering;
        self.inner.run(None, |core| core.set_pondering(pondering));
    }

    /// Evaluates `vertex` for the side to move and passes the raw network
    /// value to `continuation`. The synchronised board is left unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotRunning`] when no engine is running.
    pub fn peek_value(
        &self,
        vertex: &str,
        continuation: impl FnOnce(f64) + Send + 'static,
    ) -> Result<(), SessionError> {
        self.inner
            .run(None, |core| core.peek_value(vertex, Box::new(continuation)))
            .ok_or(SessionError::NotRunning)
    }

    /// Queues an arbitrary engine command.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotRunning`] when no engine is running.
    pub fn send_command(&self, text: &str) -> Result<(), SessionError> {
        self.inner
            .run(None, |core| core.send_command(text))
            .ok_or(SessionError::NotRunning)
    }

    /// Network shape announced by the engine, such as `256x40`.
    #[must_use]
    pub fn network_descriptor(&self) -> Option<String> {
        self.inner
            .read(|core| core.network_descriptor().map(str::to_owned))
            .flatten()
    }

    /// Whether the engine speaks the alternate (KataGo) dialect.
    #[must_use]
    pub fn is_alternate_engine(&self) -> bool {
        self.inner
            .read(|core| core.capabilities().is_alternate_dialect())
            .unwrap_or(false)
    }

    /// Whether the running engine has finished probing.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.inner.read(EngineCore::is_ready).unwrap_or(false)
    }

    /// Whether an engine process is attached.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.lock_state().running.is_some()
    }

    /// Snapshot of the running engine's capabilities.
    #[must_use]
    pub fn capabilities(&self) -> CapabilityMap {
        self.inner
            .read(|core| core.capabilities().clone())
            .unwrap_or_default()
    }

    /// Configuration of the most recent start.
    #[must_use]
    pub fn config(&self) -> Option<EngineConfig> {
        self.inner.lock_state().config.clone()
    }

    /// Process id of the running engine.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.inner
            .lock_state()
            .running
            .as_ref()
            .map(|running| running.process.pid())
    }

    fn spawn_reader<R>(
        &self,
        stream: OutputStream,
        source: R,
        generation: u64,
    ) -> std::io::Result<thread::JoinHandle<()>>
    where
        R: std::io::Read + Send + 'static,
    {
        let on_line = {
            let weak = Arc::downgrade(&self.inner);
            move |line: &str| {
                if let Some(inner) = weak.upgrade() {
                    inner.run(Some(generation), |core| match stream {
                        OutputStream::Stdout => core.handle_stdout(line),
                        OutputStream::Stderr => core.handle_stderr(line),
                    });
                }
            }
        };
        let weak = Arc::downgrade(&self.inner);
        process::spawn_reader(stream, source, on_line, move |end| {
            Inner::stream_ended(&weak, generation, stream, end);
        })
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("pid", &self.pid())
            .field("ready", &self.is_ready())
            .field("handlers", &self.inner.handlers)
            .finish_non_exhaustive()
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read<T>(&self, f: impl FnOnce(&EngineCore) -> T) -> Option<T> {
        self.lock_state()
            .running
            .as_ref()
            .map(|running| f(&running.core))
    }

    /// Runs `f` against the live core, then applies its effects unlocked.
    ///
    /// With `Some(generation)`, does nothing unless that process is current.
    fn run(
        self: &Arc<Self>,
        generation: Option<u64>,
        f: impl FnOnce(&mut EngineCore) -> Vec<Effect>,
    ) -> Option<()> {
        let (current, effects) = {
            let mut state = self.lock_state();
            let running = state.running.as_mut()?;
            if generation.is_some_and(|expected| expected != running.generation) {
                return None;
            }
            (running.generation, f(&mut running.core))
        };
        self.apply(current, effects);
        Some(())
    }

    fn apply(self: &Arc<Self>, generation: u64, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Event(event) => self.deliver(event),
                Effect::Evaluation {
                    continuation,
                    value,
                } => continuation(value),
                Effect::ScheduleUpdate => {
                    let weak = Arc::downgrade(self);
                    self.debouncer.schedule(move || {
                        if let Some(inner) = weak.upgrade() {
                            inner.run(Some(generation), EngineCore::update_now);
                        }
                    });
                }
                Effect::Failure(failure) => self.report_failure(generation, &failure),
            }
        }
    }

    fn deliver(self: &Arc<Self>, event: SessionEvent) {
        match event {
            SessionEvent::Ready => {
                debug!(target: SESSION_TARGET, "engine ready");
                if let Some(handler) = &self.handlers.ready {
                    handler(&self.session());
                }
            }
            SessionEvent::Suggestions(report) => {
                if let Some(handler) = &self.handlers.suggest {
                    handler(&report);
                }
            }
            SessionEvent::Endstate(report) => {
                if let Some(handler) = &self.handlers.endstate {
                    handler(&report);
                }
            }
        }
    }

    /// Reports `failure` unless this process already reported one.
    fn report_failure(self: &Arc<Self>, generation: u64, failure: &ProcessFailure) {
        {
            let mut state = self.lock_state();
            let Some(running) = state.running.as_mut() else {
                return;
            };
            if running.generation != generation || running.failure_reported {
                return;
            }
            running.failure_reported = true;
        }
        warn!(target: SESSION_TARGET, generation, %failure, "engine failed");
        if let Some(handler) = self.handlers.failure_handler(failure) {
            handler(&self.session(), failure);
        }
    }

    /// Reports the end of a stream.
    ///
    /// A closed stdout counts as an exit only once both readers have ended,
    /// so a fatal status line still being handled on stderr wins the
    /// report-once guard.
    fn stream_ended(weak: &Weak<Self>, generation: u64, stream: OutputStream, end: ReaderEnd) {
        let Some(inner) = weak.upgrade() else {
            return;
        };
        let exited = inner.reader_finished(generation, stream);
        match end {
            ReaderEnd::Failed(error) => {
                inner.report_failure(generation, &ProcessFailure::stream(stream.name(), error));
            }
            ReaderEnd::Closed if exited => {
                let code = inner.exit_code(generation);
                inner.report_failure(generation, &ProcessFailure::ExitedUnexpectedly { code });
            }
            ReaderEnd::Closed => {}
        }
    }

    /// Records a finished reader; true once both have ended after stdout
    /// closed.
    fn reader_finished(&self, generation: u64, stream: OutputStream) -> bool {
        let mut state = self.lock_state();
        let Some(running) = state
            .running
            .as_mut()
            .filter(|running| running.generation == generation)
        else {
            return false;
        };
        running.open_readers = running.open_readers.saturating_sub(1);
        if stream == OutputStream::Stdout {
            running.stdout_closed = true;
        }
        running.open_readers == 0 && running.stdout_closed
    }

    fn exit_code(&self, generation: u64) -> Option<i32> {
        for _ in 0..EXIT_POLL_ATTEMPTS {
            {
                let mut state = self.lock_state();
                let running = state
                    .running
                    .as_mut()
                    .filter(|running| running.generation == generation)?;
                if let Ok(Some(status)) = running.process.try_wait() {
                    return status.code();
                }
            }
            thread::sleep(EXIT_POLL_INTERVAL);
        }
        None
    }

    fn session(self: &Arc<Self>) -> Session {
        Session {
            inner: Arc::clone(self),
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.debouncer.cancel();
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(mut running) = state.running.take() {
            running.process.kill();
        }
    }
}
