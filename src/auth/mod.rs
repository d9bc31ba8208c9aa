//! Credential use cases: password hashing, session tokens and the service that
//! ties them to a [`crate::directory::Directory`].

pub mod error;
pub mod password;
pub mod service;
pub mod token;

pub use self::error::AuthError;
pub use self::service::{CredentialService, NewUser, UpdateRequest};
pub use self::token::{TokenIssuer, TokenSettings, TokenVerifier};
pub use crate::directory::UserId;

use regex::Regex;

/// Lightweight email sanity check run before anything is persisted.
pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email))
}
