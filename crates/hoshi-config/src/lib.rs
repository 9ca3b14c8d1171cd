//! Shared configuration for the hoshi engine session and its binaries.
//!
//! [`Config`] is loaded through `ortho_config`, layering built-in defaults,
//! an optional TOML file (`--config-path` or `HOSHI_CONFIG_PATH`), `HOSHI_*`
//! environment variables and command-line flags, in increasing order of
//! precedence. The engine crate converts it into its runtime configuration;
//! the CLI additionally reads the logging options.

mod defaults;
mod logging;

use camino::Utf8PathBuf;
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_ANALYZE_INTERVAL_CENTISEC, DEFAULT_ENGINE_COMMAND, DEFAULT_ENGINE_LOG_LINE_LENGTH,
    DEFAULT_KOMI, DEFAULT_LOG_FILTER, DEFAULT_MINIMUM_SUGGESTED_MOVES, DEFAULT_VISIT_LIMIT,
    default_engine_command, default_log_filter, default_log_filter_string, default_log_format,
};
pub use logging::LogFormat;

/// Runtime configuration shared by the session library and the CLI.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "HOSHI")]
pub struct Config {
    /// Engine executable path or command name.
    #[ortho_config(default = defaults::default_engine_command())]
    pub engine_command: Utf8PathBuf,
    /// Arguments passed to the engine executable.
    #[serde(default)]
    pub engine_args: Vec<String>,
    /// Interval between analysis reports, in centiseconds.
    #[ortho_config(default = defaults::DEFAULT_ANALYZE_INTERVAL_CENTISEC)]
    pub analyze_interval_centisec: u32,
    /// Minimum number of candidate moves requested per report.
    #[ortho_config(default = defaults::DEFAULT_MINIMUM_SUGGESTED_MOVES)]
    pub minimum_suggested_moves: u32,
    /// Komi sent to the engine once it reports readiness.
    #[ortho_config(default = defaults::DEFAULT_KOMI)]
    pub komi: f64,
    /// Maximum length of an engine traffic line in logs; zero disables the cap.
    #[ortho_config(default = defaults::DEFAULT_ENGINE_LOG_LINE_LENGTH)]
    pub engine_log_line_length: usize,
    /// Wait for the engine's readiness banner before probing features.
    #[ortho_config(default = true)]
    pub wait_for_startup: bool,
    /// Visit budget restored after a hypothetical-move evaluation.
    #[ortho_config(default = defaults::DEFAULT_VISIT_LIMIT)]
    pub visit_limit: u32,
    /// Tracing filter expression.
    #[ortho_config(default = defaults::default_log_filter_string())]
    pub log_filter: String,
    /// Tracing output format.
    #[ortho_config(default = defaults::default_log_format())]
    pub log_format: LogFormat,
}

impl Config {
    /// Tracing filter expression configured for the binaries.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Tracing output format configured for the binaries.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine_command: default_engine_command(),
            engine_args: Vec::new(),
            analyze_interval_centisec: DEFAULT_ANALYZE_INTERVAL_CENTISEC,
            minimum_suggested_moves: DEFAULT_MINIMUM_SUGGESTED_MOVES,
            komi: DEFAULT_KOMI,
            engine_log_line_length: DEFAULT_ENGINE_LOG_LINE_LENGTH,
            wait_for_startup: true,
            visit_limit: DEFAULT_VISIT_LIMIT,
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
        }
    }
}
