//! Process bootstrap for the `warden` binary.

use super::commands::logging::{self, ARG_VERBOSITY};
use crate::cli::{actions::Action, commands, dispatch, telemetry};
use anyhow::Result;
use tracing::Level;

/// Default subscriber level for a `-v` count or `WARDEN_LOG_LEVEL` index.
fn verbosity_level(matches: &clap::ArgMatches) -> Level {
    let index = matches.get_one::<u8>(ARG_VERBOSITY).copied().unwrap_or(0);
    logging::LOG_LEVELS
        .get(usize::from(index))
        .copied()
        .unwrap_or(Level::TRACE)
}

/// Parse arguments, install the subscriber, and pick the action to run.
///
/// Telemetry is up before dispatch so argument errors are logged.
///
/// # Errors
/// Returns an error if the subscriber cannot be installed or the arguments
/// do not describe a runnable server.
pub fn start() -> Result<Action> {
    let matches = commands::new().get_matches();

    telemetry::init(verbosity_level(&matches))?;

    dispatch::handler(&matches)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level_for(args: &[&str]) -> Level {
        temp_env::with_vars(
            [
                ("WARDEN_LOG_LEVEL", None::<&str>),
                ("WARDEN_DSN", Some("postgres://localhost/warden")),
                ("WARDEN_JWT_SECRET", Some("s3cret")),
            ],
            || verbosity_level(&commands::new().get_matches_from(args)),
        )
    }

    #[test]
    fn quiet_by_default() {
        assert_eq!(level_for(&["warden"]), Level::ERROR);
    }

    #[test]
    fn each_flag_raises_the_level() {
        assert_eq!(level_for(&["warden", "-v"]), Level::WARN);
        assert_eq!(level_for(&["warden", "-vv"]), Level::INFO);
        assert_eq!(level_for(&["warden", "-vvv"]), Level::DEBUG);
        assert_eq!(level_for(&["warden", "-vvvv"]), Level::TRACE);
        assert_eq!(level_for(&["warden", "-vvvvvvvv"]), Level::TRACE);
    }
}
