//! Protocol state machine between the session and one engine process.
//!
//! [`EngineCore`] owns the command queue, the in-flight counters, the pending
//! response table, the mirrored board and the capability map. It is driven by
//! three kinds of input: lines from the engine's standard output, lines from
//! its standard error, and requests from the session facade. It never calls
//! application code itself; every reaction that leaves the core is returned
//! as an [`Effect`] so the caller can apply it without holding its lock.
//!
//! Only one command is ever outstanding. Queued text is sent once the last
//! sent id has been acknowledged; until the startup probes complete the
//! counters are deliberately out of step, which holds back all queued work.

use std::collections::HashMap;
use std::fmt;
use std::io::{self, Write};

use tracing::{debug, trace, warn};

use crate::board::{Move, SyncPlan, TurnState, plan_sync};
use crate::capability::{CapabilityMap, Feature, FeatureProber};
use crate::config::EngineConfig;
use crate::errors::ProcessFailure;
use crate::events::{EndstateReport, Interest, SessionEvent};
use crate::logging::{DISPATCH_TARGET, snip};
use crate::parser::{
    AnalysisContext, Dialect, EndstateBlock, StatusLine, StdoutLine, classify_status,
    classify_stdout, parse_analysis_line,
};
use crate::queue::{CommandQueue, QueueEntry, is_analysis_command, join_commands, split_commands};
use crate::speedometer::RateEstimator;

#[cfg(test)]
mod tests;

/// Sink for command lines bound for the engine's standard input.
pub trait CommandWriter: Send {
    /// Writes `line` followed by a newline and flushes.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error when the line cannot be written.
    fn write_line(&mut self, line: &str) -> io::Result<()>;
}

impl<W: Write + Send> CommandWriter for W {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.write_all(line.as_bytes())?;
        self.write_all(b"\n")?;
        self.flush()
    }
}

/// Called with the peek evaluation once the engine reports it.
pub type EvaluationContinuation = Box<dyn FnOnce(f64) + Send>;

/// One-shot reaction to the response of a directly sent command.
type ResponseHook = Box<dyn FnOnce(&mut EngineCore, bool) + Send>;

/// Work the caller performs on behalf of the core.
pub enum Effect {
    /// Deliver an event to the application.
    Event(SessionEvent),
    /// Hand a peek evaluation to its continuation.
    Evaluation {
        /// Continuation installed by the peek.
        continuation: EvaluationContinuation,
        /// Raw network evaluation.
        value: f64,
    },
    /// Run [`EngineCore::update_now`] after the debounce delay.
    ScheduleUpdate,
    /// The engine can no longer be used.
    Failure(ProcessFailure),
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Event(event) => f.debug_tuple("Event").field(event).finish(),
            Self::Evaluation { value, .. } => {
                f.debug_struct("Evaluation").field("value", value).finish()
            }
            Self::ScheduleUpdate => f.write_str("ScheduleUpdate"),
            Self::Failure(failure) => f.debug_tuple("Failure").field(failure).finish(),
        }
    }
}

/// Ids of the last sent and last acknowledged commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InFlight {
    last_sent: i64,
    last_acked: i64,
}

impl InFlight {
    /// Counters of a freshly started process, blocking queued sends.
    #[must_use]
    pub const fn blocked() -> Self {
        Self {
            last_sent: -1,
            last_acked: -2,
        }
    }

    /// Whether every sent command has been answered.
    #[must_use]
    pub const fn is_settled(&self) -> bool {
        self.last_acked >= self.last_sent
    }

    /// Id of the most recent send, `-1` before the first one.
    #[must_use]
    pub const fn last_sent(&self) -> i64 {
        self.last_sent
    }

    /// Id of the most recent response.
    #[must_use]
    pub const fn last_acked(&self) -> i64 {
        self.last_acked
    }

    fn next_id(&mut self) -> i64 {
        self.last_sent += 1;
        self.last_sent
    }

    fn acknowledge(&mut self, id: i64) {
        self.last_acked = id;
    }
}

enum StderrMode {
    Status,
    Endstate(EndstateBlock),
}

/// Protocol state of one engine process.
pub struct EngineCore {
    writer: Box<dyn CommandWriter>,
    config: EngineConfig,
    interest: Interest,
    queue: CommandQueue,
    in_flight: InFlight,
    pending: HashMap<i64, ResponseHook>,
    prober: FeatureProber,
    capabilities: CapabilityMap,
    started: bool,
    ready: bool,
    pondering: bool,
    mirror: Vec<Move>,
    turn: TurnState,
    network: Option<String>,
    stderr_mode: StderrMode,
    peek: Option<EvaluationContinuation>,
    speedometer: RateEstimator,
    effects: Vec<Effect>,
}

impl EngineCore {
    /// Creates the state for a process whose input is `writer`.
    #[must_use]
    pub fn new(
        writer: Box<dyn CommandWriter>,
        config: EngineConfig,
        interest: Interest,
        pondering: bool,
    ) -> Self {
        Self {
            writer,
            config,
            interest,
            queue: CommandQueue::new(),
            in_flight: InFlight::blocked(),
            pending: HashMap::new(),
            prober: FeatureProber::new(),
            capabilities: CapabilityMap::default(),
            started: false,
            ready: false,
            pondering,
            mirror: Vec::new(),
            turn: TurnState::initial(),
            network: None,
            stderr_mode: StderrMode::Status,
            peek: None,
            speedometer: RateEstimator::default(),
            effects: Vec::new(),
        }
    }

    /// Begins startup; probing starts at once unless the engine's readiness
    /// banner is awaited.
    pub fn start(&mut self) -> Vec<Effect> {
        if !self.config.wait_for_startup {
            self.mark_started();
        }
        self.take_effects()
    }

    /// Reacts to one line of standard output.
    pub fn handle_stdout(&mut self, line: &str) -> Vec<Effect> {
        trace!(
            target: DISPATCH_TARGET,
            line = %snip(line, self.config.log_line_length),
            "stdout"
        );
        match classify_stdout(line) {
            StdoutLine::Response { id, success } => {
                self.in_flight.acknowledge(id);
                if let Some(hook) = self.pending.remove(&id) {
                    hook(self, success);
                }
            }
            StdoutLine::Analysis(text) => {
                if self.in_flight.is_settled() {
                    self.deliver_analysis(text);
                }
            }
            StdoutLine::Other => {}
        }
        self.dispatch();
        self.take_effects()
    }

    /// Reacts to one line of standard error.
    pub fn handle_stderr(&mut self, line: &str) -> Vec<Effect> {
        trace!(
            target: DISPATCH_TARGET,
            line = %snip(line, self.config.log_line_length),
            "stderr"
        );
        if let StderrMode::Endstate(block) = &mut self.stderr_mode {
            if let Some(matrix) = block.feed(line) {
                self.stderr_mode = StderrMode::Status;
                self.finish_endstate(matrix);
            }
        } else {
            self.handle_status(classify_status(line));
        }
        self.take_effects()
    }

    /// Brings the engine's board to `history` with the fewest commands.
    pub fn set_board(&mut self, history: &[Move]) -> Vec<Effect> {
        match plan_sync(&self.mirror, history) {
            SyncPlan::Clear => {
                self.clear_board();
                self.mark_turn(TurnState::initial());
            }
            plan => {
                if !plan.is_noop() {
                    for command in plan.commands() {
                        self.enqueue(QueueEntry::Command(command));
                    }
                    self.mark_turn(TurnState::after(history));
                }
                self.mirror = history.to_vec();
            }
        }
        self.take_effects()
    }

    /// Refreshes endstate and analysis, debounced when endstate is supported.
    pub fn update(&mut self) -> Vec<Effect> {
        self.request_update();
        self.take_effects()
    }

    /// Refreshes endstate and analysis immediately.
    pub fn update_now(&mut self) -> Vec<Effect> {
        self.refresh();
        self.take_effects()
    }

    /// Starts or stops continuous analysis.
    pub fn set_pondering(&mut self, pondering: bool) -> Vec<Effect> {
        if pondering != self.pondering {
            self.pondering = pondering;
            if pondering {
                self.start_analysis();
            } else {
                self.enqueue(QueueEntry::Command(String::from("name")));
            }
        }
        self.take_effects()
    }

    /// Evaluates `vertex` for the side to move without changing the board.
    ///
    /// A later peek replaces a continuation that has not fired yet.
    pub fn peek_value(&mut self, vertex: &str, continuation: EvaluationContinuation) -> Vec<Effect> {
        self.peek = Some(continuation);
        let command = join_commands([
            String::from("lz-setoption name visits value 1"),
            format!("play {} {vertex}", self.turn.to_move),
            String::from("lz-analyze interval 0"),
            format!("lz-setoption name visits value {}", self.config.visit_limit),
            String::from("undo"),
        ]);
        self.enqueue(QueueEntry::Command(command));
        self.take_effects()
    }

    /// Queues an arbitrary command.
    pub fn send_command(&mut self, text: &str) -> Vec<Effect> {
        self.enqueue(QueueEntry::Command(text.to_owned()));
        self.take_effects()
    }

    /// Probed capabilities.
    #[must_use]
    pub fn capabilities(&self) -> &CapabilityMap {
        &self.capabilities
    }

    /// Network shape such as `256x40`, once announced.
    #[must_use]
    pub fn network_descriptor(&self) -> Option<&str> {
        self.network.as_deref()
    }

    /// Whether probing has finished.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        self.ready
    }

    /// Whether continuous analysis is enabled.
    #[must_use]
    pub const fn is_pondering(&self) -> bool {
        self.pondering
    }

    /// Output dialect in use.
    #[must_use]
    pub fn dialect(&self) -> Dialect {
        if self.capabilities.is_alternate_dialect() {
            Dialect::Alternate
        } else {
            Dialect::Native
        }
    }

    /// In-flight counters.
    #[must_use]
    pub const fn in_flight(&self) -> InFlight {
        self.in_flight
    }

    /// Turn bookkeeping as of the last dispatched marker.
    #[must_use]
    pub const fn turn(&self) -> TurnState {
        self.turn
    }

    /// History the engine is believed to hold.
    #[must_use]
    pub fn mirror(&self) -> &[Move] {
        &self.mirror
    }

    /// Entries awaiting dispatch.
    #[must_use]
    pub fn queue(&self) -> &CommandQueue {
        &self.queue
    }

    fn take_effects(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.effects)
    }

    fn mark_started(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        debug!(target: DISPATCH_TARGET, "engine started; probing features");
        let komi = format!("komi {}", self.config.komi);
        self.send_direct(&komi, None);
        self.probe_next();
    }

    fn probe_next(&mut self) {
        let Some(feature) = self.prober.next_probe() else {
            self.finish_startup();
            return;
        };
        let hook: ResponseHook = Box::new(move |core: &mut Self, supported: bool| {
            debug!(target: DISPATCH_TARGET, %feature, supported, "feature probed");
            core.capabilities.record(feature, supported);
            core.probe_next();
        });
        self.send_direct(feature.probe_command(), Some(hook));
    }

    fn finish_startup(&mut self) {
        self.clear_board();
        self.ready = true;
        debug!(
            target: DISPATCH_TARGET,
            capabilities = ?self.capabilities,
            "engine ready"
        );
        self.effects.push(Effect::Event(SessionEvent::Ready));
    }

    fn handle_status(&mut self, status: StatusLine) {
        match status {
            StatusLine::NetworkSize { channels, blocks } => {
                self.network = Some(format!("{channels}x{blocks}"));
            }
            StatusLine::Ready => self.mark_started(),
            StatusLine::IncompatibleWeights => {
                warn!(target: DISPATCH_TARGET, "engine rejected its weights file");
                self.effects
                    .push(Effect::Failure(ProcessFailure::IncompatibleWeights));
            }
            StatusLine::Evaluation(value) => {
                if let Some(continuation) = self.peek.take() {
                    self.effects.push(Effect::Evaluation {
                        continuation,
                        value,
                    });
                    self.request_update();
                }
            }
            StatusLine::EndstateStart => {
                self.stderr_mode = StderrMode::Endstate(EndstateBlock::new());
            }
            StatusLine::Other => {}
        }
    }

    fn finish_endstate(&mut self, matrix: Vec<Vec<f64>>) {
        if !self.interest.endstate {
            return;
        }
        self.effects
            .push(Effect::Event(SessionEvent::Endstate(EndstateReport {
                matrix,
                move_count: self.turn.move_count,
            })));
    }

    #[expect(
        clippy::cast_precision_loss,
        reason = "visit counts stay far below 2^52"
    )]
    fn deliver_analysis(&mut self, text: &str) {
        if !self.interest.suggestions {
            return;
        }
        let context = AnalysisContext {
            dialect: self.dialect(),
            to_move: self.turn.to_move,
            komi: self.config.komi,
        };
        let mut report = parse_analysis_line(text, &context);
        report.visits_per_sec = self.speedometer.per_sec(report.visits as f64);
        self.effects
            .push(Effect::Event(SessionEvent::Suggestions(report)));
    }

    fn clear_board(&mut self) {
        self.enqueue(QueueEntry::Command(String::from("clear_board")));
        self.mirror.clear();
        self.request_update();
    }

    fn mark_turn(&mut self, turn: TurnState) {
        self.enqueue(QueueEntry::TurnMarker(turn));
        self.request_update();
    }

    fn request_update(&mut self) {
        if self.capabilities.supports(Feature::Endstate) {
            self.effects.push(Effect::ScheduleUpdate);
        } else {
            self.refresh();
        }
    }

    fn refresh(&mut self) {
        if self.interest.endstate && self.capabilities.supports(Feature::Endstate) {
            self.enqueue(QueueEntry::Command(String::from("endstate_map")));
        }
        self.start_analysis();
    }

    fn start_analysis(&mut self) {
        if self.pondering {
            let command = self.analysis_command();
            self.enqueue(QueueEntry::Command(command));
        }
    }

    fn analysis_command(&self) -> String {
        let analyzer = match self.dialect() {
            Dialect::Alternate => "kata-analyze ownership true",
            Dialect::Native => "lz-analyze",
        };
        let interval = self.config.analyze_interval_centisec;
        if self.capabilities.supports(Feature::MinMoves) {
            format!(
                "{analyzer} interval {interval} minmoves {}",
                self.config.minimum_suggested_moves
            )
        } else {
            format!("{analyzer} {interval}")
        }
    }

    fn enqueue(&mut self, entry: QueueEntry) {
        trace!(
            target: DISPATCH_TARGET,
            entry = %snip(&entry.to_string(), self.config.log_line_length),
            queue = %self.queue,
            "queued"
        );
        self.queue.push(entry);
        self.dispatch();
    }

    fn dispatch(&mut self) {
        while self.in_flight.is_settled() {
            match self.queue.pop() {
                None => return,
                Some(QueueEntry::TurnMarker(turn)) => self.turn = turn,
                Some(QueueEntry::Command(text)) => {
                    for part in split_commands(&text) {
                        self.send_direct(part, None);
                    }
                }
            }
        }
    }

    fn send_direct(&mut self, command: &str, hook: Option<ResponseHook>) {
        let id = self.in_flight.next_id();
        if let Some(hook) = hook {
            self.pending.insert(id, hook);
        }
        if is_analysis_command(command) {
            self.speedometer.reset();
        }
        let line = format!("{id} {command}");
        debug!(
            target: DISPATCH_TARGET,
            id,
            command = %snip(command, self.config.log_line_length),
            "sent"
        );
        if let Err(error) = self.writer.write_line(&line) {
            warn!(target: DISPATCH_TARGET, id, %error, "failed to write command");
            self.effects
                .push(Effect::Failure(ProcessFailure::stream("stdin", error)));
        }
    }
}
