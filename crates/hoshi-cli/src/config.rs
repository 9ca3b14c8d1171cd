//! Configuration loading helpers for the hoshi CLI.
//!
//! Leading configuration flags are peeled off for `ortho_config`; the
//! remaining tokens are parsed by clap as the subcommand.

use std::ffi::{OsStr, OsString};

use hoshi_config::Config;
use ortho_config::OrthoConfig;

use crate::AppError;

/// CLI flags recognised by the configuration loader.
///
/// Every entry takes a value. Keep this list in step with the fields of
/// [`Config`]; boolean options are only settable by file or environment.
pub(crate) const CONFIG_CLI_FLAGS: &[&str] = &[
    "--config-path",
    "--engine-command",
    "--analyze-interval-centisec",
    "--minimum-suggested-moves",
    "--komi",
    "--engine-log-line-length",
    "--visit-limit",
    "--log-filter",
    "--log-format",
];

pub(crate) trait ConfigLoader {
    /// Loads configuration from the filtered argument list.
    ///
    /// Configuration flags must precede the subcommand. Flags appearing
    /// after it are handed to clap and rejected there.
    fn load(&self, args: &[OsString]) -> Result<Config, AppError>;
}

pub(crate) struct OrthoConfigLoader;

impl ConfigLoader for OrthoConfigLoader {
    fn load(&self, args: &[OsString]) -> Result<Config, AppError> {
        Config::load_from_iter(args.iter().cloned()).map_err(AppError::LoadConfiguration)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlagAction {
    Include { needs_value: bool },
    Stop,
}

fn classify_flag(argument: &OsStr) -> FlagAction {
    let text = argument.to_string_lossy();
    if !text.starts_with("--") {
        return FlagAction::Stop;
    }
    let (flag, has_inline_value) = text
        .split_once('=')
        .map_or((text.as_ref(), false), |(flag, _)| (flag, true));
    if CONFIG_CLI_FLAGS.contains(&flag) {
        FlagAction::Include {
            needs_value: !has_inline_value,
        }
    } else {
        FlagAction::Stop
    }
}

/// Arguments destined for the loader plus the remainder for clap.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct ConfigArgumentSplit {
    pub(crate) config_arguments: Vec<OsString>,
    pub(crate) command_arguments: Vec<OsString>,
}

/// Splits `args` at the first token that is not a configuration flag.
///
/// The program name is kept at the head of both halves.
pub(crate) fn split_config_arguments(args: &[OsString]) -> ConfigArgumentSplit {
    let mut tokens = args.iter();
    let Some(program) = tokens.next() else {
        return ConfigArgumentSplit::default();
    };

    let mut config_arguments = vec![program.clone()];
    let mut tokens = tokens.peekable();
    while let Some(argument) = tokens.peek() {
        match classify_flag(argument) {
            FlagAction::Include { needs_value } => {
                config_arguments.push((*argument).clone());
                tokens.next();
                if needs_value {
                    if let Some(value) = tokens.next() {
                        config_arguments.push(value.clone());
                    }
                }
            }
            FlagAction::Stop => break,
        }
    }

    let mut command_arguments = vec![program.clone()];
    command_arguments.extend(tokens.cloned());
    ConfigArgumentSplit {
        config_arguments,
        command_arguments,
    }
}
