//! Runtime configuration of one engine process.

use std::path::PathBuf;

use hoshi_config::Config;

/// Everything needed to spawn and drive an engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// The executable path or command name.
    pub command: PathBuf,
    /// Arguments passed to the engine.
    pub args: Vec<String>,
    /// Working directory for the spawned process.
    pub working_dir: Option<PathBuf>,
    /// Interval between analysis reports, in centiseconds.
    pub analyze_interval_centisec: u32,
    /// Minimum number of candidates requested per report.
    pub minimum_suggested_moves: u32,
    /// Komi sent once the engine is ready.
    pub komi: f64,
    /// Cap on logged traffic lines; zero disables it.
    pub log_line_length: usize,
    /// Wait for the readiness banner before probing.
    pub wait_for_startup: bool,
    /// Visit budget restored after a peek.
    pub visit_limit: u32,
}

impl EngineConfig {
    /// Configuration for `command` with default tuning.
    #[must_use]
    pub fn new(command: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            ..Self::from(&Config::default())
        }
    }

    /// Sets the engine arguments.
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Sets a custom working directory.
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Sets the komi.
    #[must_use]
    pub fn with_komi(mut self, komi: f64) -> Self {
        self.komi = komi;
        self
    }

    /// Sets the analysis interval in centiseconds.
    #[must_use]
    pub fn with_analyze_interval(mut self, centisec: u32) -> Self {
        self.analyze_interval_centisec = centisec;
        self
    }

    /// Controls whether probing waits for the readiness banner.
    #[must_use]
    pub fn with_wait_for_startup(mut self, wait: bool) -> Self {
        self.wait_for_startup = wait;
        self
    }

    /// Sets the visit budget restored after a peek.
    #[must_use]
    pub fn with_visit_limit(mut self, visits: u32) -> Self {
        self.visit_limit = visits;
        self
    }
}

impl From<&Config> for EngineConfig {
    fn from(config: &Config) -> Self {
        Self {
            command: config.engine_command.clone().into_std_path_buf(),
            args: config.engine_args.clone(),
            working_dir: None,
            analyze_interval_centisec: config.analyze_interval_centisec,
            minimum_suggested_moves: config.minimum_suggested_moves,
            komi: config.komi,
            log_line_length: config.engine_log_line_length,
            wait_for_startup: config.wait_for_startup,
            visit_limit: config.visit_limit,
        }
    }
}
