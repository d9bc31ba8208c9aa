//! `-v` / `WARDEN_LOG_LEVEL`: how chatty the subscriber is.

use clap::{builder::ValueParser, Arg, ArgAction, Command};
use tracing::Level;

pub const ARG_VERBOSITY: &str = "verbosity";

/// Levels in verbosity order; the argument's value is an index into this.
pub const LOG_LEVELS: [Level; 5] = [
    Level::ERROR,
    Level::WARN,
    Level::INFO,
    Level::DEBUG,
    Level::TRACE,
];

/// Accepts a level name (any case) or its index.
#[must_use]
pub fn validator_log_level() -> ValueParser {
    ValueParser::from(|value: &str| -> Result<u8, String> {
        let position = match value.parse::<usize>() {
            Ok(index) if index < LOG_LEVELS.len() => Some(index),
            Ok(_) => None,
            Err(_) => LOG_LEVELS
                .iter()
                .position(|level| level.as_str().eq_ignore_ascii_case(value)),
        };

        position
            .and_then(|index| u8::try_from(index).ok())
            .ok_or_else(|| format!("invalid log level `{value}`, expected one of error, warn, info, debug, trace"))
    })
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_VERBOSITY)
            .short('v')
            .long("verbose")
            .help("Raise log verbosity; repeat up to -vvvv (default: errors only)")
            .env("WARDEN_LOG_LEVEL")
            .global(true)
            .action(ArgAction::Count)
            .value_parser(validator_log_level()),
    )
}
