//! Built-in defaults shared by the engine library and the binaries.

use camino::Utf8PathBuf;

/// Engine executable used when none is configured.
pub const DEFAULT_ENGINE_COMMAND: &str = "leelaz";

/// Analysis report interval in centiseconds.
pub const DEFAULT_ANALYZE_INTERVAL_CENTISEC: u32 = 10;

/// Minimum number of candidate moves requested from engines that accept the hint.
pub const DEFAULT_MINIMUM_SUGGESTED_MOVES: u32 = 30;

/// Komi applied when the session starts.
pub const DEFAULT_KOMI: f64 = 7.5;

/// Engine traffic lines longer than this are shortened in logs.
pub const DEFAULT_ENGINE_LOG_LINE_LENGTH: usize = 500;

/// Visit budget restored after a peek; zero leaves the engine unlimited.
pub const DEFAULT_VISIT_LIMIT: u32 = 0;

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default engine executable as a path.
#[must_use]
pub fn default_engine_command() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_ENGINE_COMMAND)
}

/// Default log filter expression used by the binaries.
#[must_use]
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binaries.
#[must_use]
pub fn default_log_format() -> crate::logging::LogFormat {
    crate::logging::LogFormat::Json
}
