//! User directory: the persistent store behind the credential service.
//!
//! The directory owns email uniqueness. Implementations must reject a second
//! record (or an update) carrying an email another user already holds with
//! [`DirectoryError::EmailTaken`], and every call must be atomic on its own.

pub mod memory;
pub mod postgres;

pub use memory::MemoryDirectory;
pub use postgres::PgDirectory;

use serde::{Deserialize, Serialize};
use std::{fmt, future::Future};
use thiserror::Error;

pub type UserId = i64;

/// Profile fields supplied at registration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub access_code: String,
    pub user_type: String,
}

/// A stored user. The password hash is never serialized.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: UserId,
    #[serde(flatten)]
    pub profile: Profile,
    #[serde(skip)]
    pub password_hash: String,
}

impl User {
    #[must_use]
    pub fn email(&self) -> &str {
        &self.profile.email
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("profile", &self.profile)
            .field("password_hash", &"***")
            .finish()
    }
}

/// Record handed to [`Directory::insert`], password already hashed.
#[derive(Clone)]
pub struct NewUserRecord {
    pub profile: Profile,
    pub password_hash: String,
}

impl fmt::Debug for NewUserRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewUserRecord")
            .field("profile", &self.profile)
            .field("password_hash", &"***")
            .finish()
    }
}

/// Backend failure carried by [`DirectoryError::Unavailable`].
pub type StoreError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("user not found")]
    NotFound,
    #[error("email already taken")]
    EmailTaken,
    #[error("store unavailable: {0}")]
    Unavailable(#[source] StoreError),
}

impl DirectoryError {
    pub fn unavailable(err: impl Into<StoreError>) -> Self {
        Self::Unavailable(err.into())
    }
}

/// Store contract consumed by [`crate::auth::CredentialService`].
///
/// Update operations return the number of rows changed so callers can detect
/// a user that vanished between lookup and write.
pub trait Directory: Send + Sync {
    fn find_by_email(&self, email: &str) -> impl Future<Output = Result<User, DirectoryError>> + Send;

    fn find_by_id(&self, id: UserId) -> impl Future<Output = Result<User, DirectoryError>> + Send;

    fn insert(
        &self,
        user: NewUserRecord,
    ) -> impl Future<Output = Result<UserId, DirectoryError>> + Send;

    fn update_email(
        &self,
        id: UserId,
        email: &str,
    ) -> impl Future<Output = Result<u64, DirectoryError>> + Send;

    fn update_password(
        &self,
        id: UserId,
        password_hash: &str,
    ) -> impl Future<Output = Result<u64, DirectoryError>> + Send;

    /// Change email and password hash together; either both land or neither does.
    fn update_credentials(
        &self,
        id: UserId,
        email: &str,
        password_hash: &str,
    ) -> impl Future<Output = Result<u64, DirectoryError>> + Send;

    /// Liveness check used by the health endpoint.
    fn ping(&self) -> impl Future<Output = Result<(), DirectoryError>> + Send;
}
