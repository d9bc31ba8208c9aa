//! Register, login and credential-update use cases.

use super::{
    password::{self, PasswordError, MAX_PASSWORD_BYTES},
    token::{TokenIssuer, TokenSettings, TokenVerifier},
    valid_email, AuthError,
};
use crate::directory::{Directory, DirectoryError, NewUserRecord, Profile, UserId};
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use tracing::{debug, error, info, instrument, warn};

/// Registration input: profile plus plaintext password.
pub struct NewUser {
    pub profile: Profile,
    pub password: SecretString,
}

impl fmt::Debug for NewUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewUser")
            .field("profile", &self.profile)
            .field("password", &"***")
            .finish()
    }
}

/// Caller token plus the fields to change. Empty strings count as absent.
pub struct UpdateRequest {
    pub token: SecretString,
    pub new_email: Option<String>,
    pub new_password: Option<SecretString>,
}

impl UpdateRequest {
    #[must_use]
    pub fn new(token: String, new_email: Option<String>, new_password: Option<String>) -> Self {
        Self {
            token: SecretString::from(token),
            new_email: new_email.filter(|email| !email.is_empty()),
            new_password: new_password
                .filter(|password| !password.is_empty())
                .map(SecretString::from),
        }
    }
}

impl fmt::Debug for UpdateRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateRequest")
            .field("token", &"***")
            .field("new_email", &self.new_email)
            .field("new_password", &self.new_password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Orchestrates hashing, tokens and the directory. Holds no per-request state,
/// so one instance is shared by every request.
pub struct CredentialService<D> {
    directory: D,
    issuer: TokenIssuer,
    verifier: TokenVerifier,
}

impl<D: Directory> CredentialService<D> {
    #[must_use]
    pub fn new(directory: D, settings: &TokenSettings) -> Self {
        Self {
            directory,
            issuer: TokenIssuer::new(settings),
            verifier: TokenVerifier::new(settings),
        }
    }

    #[must_use]
    pub fn directory(&self) -> &D {
        &self.directory
    }

    /// Create a user and return its id.
    ///
    /// # Errors
    /// [`AuthError::Validation`], [`AuthError::DuplicateEmail`],
    /// [`AuthError::Hashing`] or [`AuthError::Persistence`].
    #[instrument(skip(self, user), fields(email = %user.profile.email))]
    pub async fn register(&self, user: NewUser) -> Result<UserId, AuthError> {
        if !valid_email(&user.profile.email) {
            return Err(AuthError::Validation("invalid email".to_string()));
        }
        check_password(&user.password)?;

        // A store failure must not read as "email is free".
        match self.directory.find_by_email(&user.profile.email).await {
            Ok(_) => {
                debug!("Email already registered");
                return Err(AuthError::DuplicateEmail);
            }
            Err(DirectoryError::NotFound) => (),
            Err(e) => {
                error!("Error checking if user exists: {}", e);
                return Err(AuthError::Persistence(e));
            }
        }

        let password_hash = hash_password(user.password).await?;

        let record = NewUserRecord {
            profile: user.profile,
            password_hash,
        };

        match self.directory.insert(record).await {
            Ok(id) => {
                info!(user_id = id, "User registered");
                Ok(id)
            }
            // Lost a race with a concurrent registration.
            Err(DirectoryError::EmailTaken) => Err(AuthError::DuplicateEmail),
            Err(e) => {
                error!("Error inserting user: {}", e);
                Err(AuthError::Persistence(e))
            }
        }
    }

    /// Check a password and mint a session token.
    ///
    /// Unknown email and wrong password are the same error, and both pay for
    /// one Argon2 verification.
    ///
    /// # Errors
    /// [`AuthError::InvalidCredentials`], [`AuthError::TokenIssuance`] or
    /// [`AuthError::Persistence`].
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: SecretString) -> Result<String, AuthError> {
        let user = match self.directory.find_by_email(email).await {
            Ok(user) => user,
            Err(DirectoryError::NotFound) => {
                debug!("Unknown email");
                let _ = tokio::task::spawn_blocking(move || {
                    password::verify(password.expose_secret(), password::dummy_hash())
                })
                .await;
                return Err(AuthError::InvalidCredentials);
            }
            Err(e) => {
                error!("Error getting user: {}", e);
                return Err(AuthError::Persistence(e));
            }
        };

        if !verify_password(password, user.password_hash.clone()).await? {
            debug!(user_id = user.id, "Password mismatch");
            return Err(AuthError::InvalidCredentials);
        }

        let token = self.issuer.issue(user.id).map_err(|e| {
            error!("Error generating token: {}", e);
            AuthError::TokenIssuance(e)
        })?;

        info!(user_id = user.id, "Login successful");

        Ok(token)
    }

    /// Change the caller's email and/or password.
    ///
    /// The caller is identified only by the token subject; the user record is
    /// re-read from the directory. When both fields change they are written
    /// in one atomic directory call.
    ///
    /// # Errors
    /// [`AuthError::Unauthorized`], [`AuthError::UserNotFound`],
    /// [`AuthError::Validation`], [`AuthError::EmailInUse`],
    /// [`AuthError::UpdateConflict`], [`AuthError::Hashing`] or
    /// [`AuthError::Persistence`].
    #[instrument(skip(self, request))]
    pub async fn update_credentials(&self, request: UpdateRequest) -> Result<String, AuthError> {
        let UpdateRequest {
            token,
            new_email,
            new_password,
        } = request;

        let claims = self.verifier.verify(token.expose_secret()).map_err(|e| {
            warn!("Rejected token: {}", e);
            AuthError::Unauthorized
        })?;

        let user_id: UserId = claims.sub.parse().map_err(|_| {
            warn!("Token subject is not a user id");
            AuthError::Unauthorized
        })?;

        let user = match self.directory.find_by_id(user_id).await {
            Ok(user) => user,
            Err(DirectoryError::NotFound) => {
                warn!(user_id, "Token subject no longer exists");
                return Err(AuthError::UserNotFound);
            }
            Err(e) => {
                error!("Error getting user: {}", e);
                return Err(AuthError::Persistence(e));
            }
        };

        if let Some(email) = &new_email {
            if !valid_email(email) {
                return Err(AuthError::Validation("invalid email".to_string()));
            }

            match self.directory.find_by_email(email).await {
                Ok(owner) if owner.id != user.id => {
                    debug!(user_id = user.id, "Email owned by another user");
                    return Err(AuthError::EmailInUse);
                }
                Ok(_) | Err(DirectoryError::NotFound) => (),
                Err(e) => {
                    error!("Error checking existing email: {}", e);
                    return Err(AuthError::Persistence(e));
                }
            }
        }

        let new_hash = match new_password {
            Some(password) => {
                check_password(&password)?;
                Some(hash_password(password).await?)
            }
            None => None,
        };

        let (rows, message) = match (new_email.as_deref(), new_hash.as_deref()) {
            (Some(email), Some(hash)) => (
                self.directory
                    .update_credentials(user.id, email, hash)
                    .await,
                "user email and password updated successfully",
            ),
            (Some(email), None) => (
                self.directory.update_email(user.id, email).await,
                "user updated successfully",
            ),
            (None, Some(hash)) => (
                self.directory.update_password(user.id, hash).await,
                "user password updated successfully",
            ),
            (None, None) => {
                return Err(AuthError::Validation(
                    "email or password is required".to_string(),
                ))
            }
        };

        let rows = rows.map_err(|e| match e {
            DirectoryError::EmailTaken => AuthError::EmailInUse,
            DirectoryError::NotFound => AuthError::UpdateConflict,
            e => {
                error!(user_id = user.id, "Error updating credentials: {}", e);
                AuthError::Persistence(e)
            }
        })?;

        if rows != 1 {
            warn!(user_id = user.id, rows, "Update did not change exactly one row");
            return Err(AuthError::UpdateConflict);
        }

        info!(user_id = user.id, "Credentials updated");

        Ok(message.to_string())
    }
}

impl<D> fmt::Debug for CredentialService<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialService")
            .field("issuer", &self.issuer)
            .field("verifier", &self.verifier)
            .finish_non_exhaustive()
    }
}

fn check_password(password: &SecretString) -> Result<(), AuthError> {
    let len = password.expose_secret().len();
    if len == 0 {
        return Err(AuthError::Validation("password is required".to_string()));
    }
    if len > MAX_PASSWORD_BYTES {
        return Err(AuthError::Validation(format!(
            "password exceeds {MAX_PASSWORD_BYTES} bytes"
        )));
    }
    Ok(())
}

// Argon2 takes tens of milliseconds; keep it off the async workers.
async fn hash_password(password: SecretString) -> Result<String, AuthError> {
    tokio::task::spawn_blocking(move || password::hash(password.expose_secret()))
        .await
        .map_err(|e| {
            error!("Hashing task failed: {}", e);
            AuthError::Hashing(PasswordError::Interrupted)
        })?
        .map_err(|e| {
            error!("Error hashing password: {}", e);
            AuthError::Hashing(e)
        })
}

async fn verify_password(password: SecretString, hash: String) -> Result<bool, AuthError> {
    let result = tokio::task::spawn_blocking(move || password::verify(password.expose_secret(), &hash))
        .await
        .map_err(|e| {
            error!("Verification task failed: {}", e);
            AuthError::Hashing(PasswordError::Interrupted)
        })?;

    match result {
        Ok(matches) => Ok(matches),
        Err(e) => {
            // A corrupt stored hash can never match; keep the answer generic.
            error!("Stored password hash is unusable: {}", e);
            Ok(false)
        }
    }
}
