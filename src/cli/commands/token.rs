use crate::auth::token::parse_expiration_hours;
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_JWT_SECRET: &str = "jwt-secret";
pub const ARG_JWT_EXPIRATION: &str = "jwt-expiration";

#[derive(Debug, Clone)]
pub struct Options {
    pub secret: SecretString,
    pub expiration_hours: u64,
}

impl Options {
    /// Parse token arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the signing secret is missing or empty.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let secret = match matches.get_one::<String>(ARG_JWT_SECRET) {
            Some(value) if !value.trim().is_empty() => SecretString::from(value.clone()),
            _ => anyhow::bail!("missing required argument: --{ARG_JWT_SECRET}"),
        };

        let expiration_hours = parse_expiration_hours(
            matches
                .get_one::<String>(ARG_JWT_EXPIRATION)
                .map(String::as_str),
        );

        Ok(Self {
            secret,
            expiration_hours,
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_JWT_SECRET)
                .long(ARG_JWT_SECRET)
                .help("Secret used to sign and verify session tokens (HS256)")
                .env("WARDEN_JWT_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_JWT_EXPIRATION)
                .long(ARG_JWT_EXPIRATION)
                .help("Session token lifetime in hours (default: 24)")
                .env("WARDEN_JWT_EXPIRATION"),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn matches(args: &[&str]) -> ArgMatches {
        with_args(Command::new("warden")).get_matches_from(args)
    }

    #[test]
    fn test_parse_secret_and_expiration() -> anyhow::Result<()> {
        temp_env::with_vars(
            [
                ("WARDEN_JWT_SECRET", None::<&str>),
                ("WARDEN_JWT_EXPIRATION", None::<&str>),
            ],
            || {
                let options = Options::parse(&matches(&[
                    "warden",
                    "--jwt-secret",
                    "s3cret",
                    "--jwt-expiration",
                    "2",
                ]))?;
                assert_eq!(options.secret.expose_secret(), "s3cret");
                assert_eq!(options.expiration_hours, 2);
                Ok(())
            },
        )
    }

    #[test]
    fn test_expiration_fallback() -> anyhow::Result<()> {
        temp_env::with_vars(
            [
                ("WARDEN_JWT_SECRET", Some("s3cret")),
                ("WARDEN_JWT_EXPIRATION", Some("soon")),
            ],
            || {
                let options = Options::parse(&matches(&["warden"]))?;
                assert_eq!(options.expiration_hours, 24);
                Ok(())
            },
        )
    }

    #[test]
    fn test_empty_secret_is_rejected() {
        temp_env::with_vars([("WARDEN_JWT_SECRET", Some("  "))], || {
            let result = Options::parse(&matches(&["warden"]));
            assert!(result.is_err());
            if let Err(err) = result {
                assert!(err.to_string().contains("--jwt-secret"));
            }
        });
    }

    #[test]
    fn test_secret_hidden_from_debug() -> anyhow::Result<()> {
        temp_env::with_vars([("WARDEN_JWT_SECRET", Some("s3cret"))], || {
            let options = Options::parse(&matches(&["warden"]))?;
            assert!(!format!("{options:?}").contains("s3cret"));
            Ok(())
        })
    }
}
