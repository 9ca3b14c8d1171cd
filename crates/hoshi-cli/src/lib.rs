//! Command-line runtime for driving a hoshi engine session.
//!
//! The runtime splits leading configuration flags from the subcommand,
//! loads [`hoshi_config::Config`] through `ortho_config`, installs
//! telemetry, and then runs one session-backed command. Output is written
//! to the supplied handles so tests can capture it.

use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use thiserror::Error;

use hoshi_engine::{ProcessFailure, SessionError};

mod commands;
mod config;
pub mod telemetry;

use config::{ConfigLoader, OrthoConfigLoader, split_config_arguments};
use telemetry::TelemetryError;

#[derive(Debug, Parser)]
#[command(
    name = "hoshi",
    version,
    about = "Drive a Leela Zero compatible analysis engine over GTP",
    arg_required_else_help = true,
    after_help = "Configuration flags such as --engine-command, --komi and \
                  --log-format must precede the subcommand."
)]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Debug, Subcommand)]
enum CliCommand {
    /// Stream analysis of a position as JSON lines.
    Analyse(AnalyseArgs),
    /// Start the engine, report what it supports, and exit.
    Probe(ProbeArgs),
}

#[derive(Debug, Args)]
pub(crate) struct AnalyseArgs {
    /// Moves to play from the empty board, alternating from Black.
    #[arg(value_name = "VERTEX")]
    pub(crate) moves: Vec<String>,
    /// Seconds to stream before stopping the engine.
    #[arg(long, default_value_t = 10)]
    pub(crate) duration_secs: u64,
    /// Also stream endstate estimates when the engine offers them.
    #[arg(long)]
    pub(crate) endstate: bool,
}

#[derive(Debug, Args)]
pub(crate) struct ProbeArgs {
    /// Seconds to wait for the engine to finish probing.
    #[arg(long, default_value_t = 30)]
    pub(crate) timeout_secs: u64,
}

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(Arc<ortho_config::OrthoError>),
    #[error("{0}")]
    CliUsage(clap::Error),
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("engine failed: {0}")]
    Engine(ProcessFailure),
    #[error("engine was not ready after {seconds}s")]
    StartupTimeout { seconds: u64 },
    #[error("failed to serialise output: {0}")]
    Serialise(#[from] serde_json::Error),
    #[error("failed to write output: {0}")]
    Output(#[from] std::io::Error),
}

/// Runs the CLI using the provided arguments and IO handles.
#[must_use]
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    run_with_loader(args, stdout, stderr, &OrthoConfigLoader)
}

fn run_with_loader<I, W, E, L>(args: I, stdout: &mut W, stderr: &mut E, loader: &L) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    let args: Vec<OsString> = args.into_iter().collect();
    let split = split_config_arguments(&args);

    let cli = match Cli::try_parse_from(&split.command_arguments) {
        Ok(cli) => cli,
        Err(error) if !error.use_stderr() => {
            let _ = write!(stdout, "{}", error.render());
            return ExitCode::SUCCESS;
        }
        Err(error) => return report(stderr, &AppError::CliUsage(error)),
    };

    let result = loader
        .load(&split.config_arguments)
        .and_then(|config| {
            telemetry::initialise(&config)?;
            Ok(config)
        })
        .and_then(|config| match &cli.command {
            CliCommand::Analyse(analyse) => commands::analyse(&config, analyse, stdout),
            CliCommand::Probe(probe) => commands::probe(&config, probe, stdout),
        });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => report(stderr, &error),
    }
}

fn report<E: Write>(stderr: &mut E, error: &AppError) -> ExitCode {
    let _ = writeln!(stderr, "{error}");
    ExitCode::FAILURE
}

#[cfg(test)]
mod tests {
    use hoshi_config::Config;
    use rstest::rstest;

    use super::*;

    struct FixedLoader(Config);

    impl ConfigLoader for FixedLoader {
        fn load(&self, _args: &[OsString]) -> Result<Config, AppError> {
            Ok(self.0.clone())
        }
    }

    fn run_captured(args: &[&str], config: Config) -> (ExitCode, String, String) {
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let code = run_with_loader(
            args.iter().map(OsString::from),
            &mut stdout,
            &mut stderr,
            &FixedLoader(config),
        );
        (
            code,
            String::from_utf8_lossy(&stdout).into_owned(),
            String::from_utf8_lossy(&stderr).into_owned(),
        )
    }

    #[rstest]
    fn help_is_written_to_stdout() {
        let (code, stdout, _) = run_captured(&["hoshi", "--help"], Config::default());

        assert_eq!(code, ExitCode::SUCCESS);
        assert!(stdout.contains("analyse"), "help lists subcommands: {stdout}");
    }

    #[rstest]
    fn unknown_subcommand_is_a_usage_error() {
        let (code, _, stderr) = run_captured(&["hoshi", "ponder"], Config::default());

        assert_eq!(code, ExitCode::FAILURE);
        assert!(stderr.contains("ponder"), "usage error names the token: {stderr}");
    }

    #[rstest]
    fn missing_engine_reports_spawn_failure() {
        let config = Config {
            engine_command: "/nonexistent/hoshi-test-engine".into(),
            ..Config::default()
        };

        let (code, stdout, stderr) = run_captured(&["hoshi", "probe"], config);

        assert_eq!(code, ExitCode::FAILURE);
        assert!(stdout.is_empty());
        assert!(
            stderr.contains("engine binary not found"),
            "unexpected stderr: {stderr}"
        );
    }
}
