use super::{password::PasswordError, token::TokenError};
use crate::directory::DirectoryError;
use thiserror::Error;

/// Failures of the credential use cases.
///
/// Client-facing variants carry just enough to pick a status code; the
/// server-side variants keep their cause for logging only.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("email already exists")]
    DuplicateEmail,
    #[error("email already in use")]
    EmailInUse,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("unauthorized")]
    Unauthorized,
    #[error("user not found")]
    UserNotFound,
    #[error("update conflict")]
    UpdateConflict,

    #[error("persistence error: {0}")]
    Persistence(#[source] DirectoryError),
    #[error("hashing error: {0}")]
    Hashing(#[source] PasswordError),
    #[error("token issuance error: {0}")]
    TokenIssuance(#[source] TokenError),
}

impl AuthError {
    /// Server-side failures: logged with detail, reported generically.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::Persistence(_) | Self::Hashing(_) | Self::TokenIssuance(_)
        )
    }
}
