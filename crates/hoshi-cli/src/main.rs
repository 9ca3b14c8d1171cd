//! CLI entrypoint for the hoshi engine session tool.
//!
//! The binary delegates to [`hoshi_cli::run`], which loads configuration,
//! installs telemetry, and drives an engine session for the chosen command.

use std::io;
use std::process::ExitCode;

fn main() -> ExitCode {
    // Unlocked handles: engine reader threads log to stderr while the main
    // thread is streaming.
    let mut stdout = io::stdout();
    let mut stderr = io::stderr();
    hoshi_cli::run(std::env::args_os(), &mut stdout, &mut stderr)
}
