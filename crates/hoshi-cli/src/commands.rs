//! Session-backed subcommands.

use std::io::Write;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use hoshi_config::Config;
use hoshi_engine::{
    CapabilityMap, Color, EngineConfig, Move, ProcessFailure, Session, SessionEvent,
    SessionHandlers,
};

use crate::{AnalyseArgs, AppError, ProbeArgs};

const CLI_TARGET: &str = "hoshi_cli::commands";

enum Update {
    Event(SessionEvent),
    Failure(ProcessFailure),
}

fn forward(sender: &Sender<Update>, update: Update) {
    if sender.send(update).is_err() {
        debug!(target: CLI_TARGET, "update dropped after the command finished");
    }
}

fn failure_forwarder(
    sender: &Sender<Update>,
) -> impl Fn(&Session, &ProcessFailure) + Send + Sync + 'static {
    let sender = sender.clone();
    move |_, failure| forward(&sender, Update::Failure(failure.clone()))
}

/// What `probe` prints once the engine is ready.
#[derive(Debug, Serialize)]
struct ProbeReport {
    network: Option<String>,
    alternate_dialect: bool,
    capabilities: CapabilityMap,
}

/// Assigns alternating colours from Black to `vertices`.
pub(crate) fn alternating_moves(vertices: &[String]) -> Vec<Move> {
    vertices
        .iter()
        .scan(Color::Black, |color, vertex| {
            let played = Move::new(vertex.as_str(), *color);
            *color = color.opponent();
            Some(played)
        })
        .collect()
}

/// Streams every session event as a JSON line until the duration elapses.
pub(crate) fn analyse<W: Write>(
    config: &Config,
    args: &AnalyseArgs,
    stdout: &mut W,
) -> Result<(), AppError> {
    let (sender, receiver) = mpsc::channel();
    let moves = alternating_moves(&args.moves);

    let ready_sender = sender.clone();
    let suggest_sender = sender.clone();
    let mut handlers = SessionHandlers::new()
        .on_ready(move |session| {
            if let Err(error) = session.set_board(&moves) {
                warn!(target: CLI_TARGET, %error, "could not set the board");
            }
            forward(&ready_sender, Update::Event(SessionEvent::Ready));
        })
        .on_suggest(move |report| {
            forward(
                &suggest_sender,
                Update::Event(SessionEvent::Suggestions(report.clone())),
            );
        })
        .on_restart(failure_forwarder(&sender));
    if args.endstate {
        let endstate_sender = sender.clone();
        handlers = handlers.on_endstate(move |report| {
            forward(
                &endstate_sender,
                Update::Event(SessionEvent::Endstate(report.clone())),
            );
        });
    }

    let session = Session::new(handlers);
    session.start(EngineConfig::from(config))?;
    info!(
        target: CLI_TARGET,
        moves = args.moves.len(),
        duration_secs = args.duration_secs,
        "analysing"
    );

    let deadline = Instant::now() + Duration::from_secs(args.duration_secs);
    let streamed = stream_until(&receiver, deadline, stdout);
    session.kill();
    streamed
}

fn stream_until<W: Write>(
    receiver: &Receiver<Update>,
    deadline: Instant,
    stdout: &mut W,
) -> Result<(), AppError> {
    while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
        match receiver.recv_timeout(remaining) {
            Ok(Update::Event(event)) => write_json_line(stdout, &event)?,
            Ok(Update::Failure(failure)) => return Err(AppError::Engine(failure)),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => break,
        }
    }
    Ok(())
}

/// Prints the engine's network size, dialect and feature map.
pub(crate) fn probe<W: Write>(
    config: &Config,
    args: &ProbeArgs,
    stdout: &mut W,
) -> Result<(), AppError> {
    let (sender, receiver) = mpsc::channel();
    let ready_sender = sender.clone();
    let handlers = SessionHandlers::new()
        .on_ready(move |_| forward(&ready_sender, Update::Event(SessionEvent::Ready)))
        .on_restart(failure_forwarder(&sender));

    let session = Session::new(handlers);
    session.start(EngineConfig::from(config))?;

    let waited = wait_for_ready(&receiver, Duration::from_secs(args.timeout_secs));
    let report = waited.map(|()| ProbeReport {
        network: session.network_descriptor(),
        alternate_dialect: session.is_alternate_engine(),
        capabilities: session.capabilities(),
    });
    session.kill();
    write_json_line(stdout, &report?)
}

fn wait_for_ready(receiver: &Receiver<Update>, timeout: Duration) -> Result<(), AppError> {
    let deadline = Instant::now() + timeout;
    while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
        match receiver.recv_timeout(remaining) {
            Ok(Update::Event(SessionEvent::Ready)) => return Ok(()),
            Ok(Update::Event(_)) => {}
            Ok(Update::Failure(failure)) => return Err(AppError::Engine(failure)),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => break,
        }
    }
    Err(AppError::StartupTimeout {
        seconds: timeout.as_secs(),
    })
}

fn write_json_line<W: Write, T: Serialize>(stdout: &mut W, value: &T) -> Result<(), AppError> {
    serde_json::to_writer(&mut *stdout, value)?;
    writeln!(stdout)?;
    stdout.flush()?;
    Ok(())
}
