//! Argon2id password hashing.
//!
//! Hashes are PHC strings (`$argon2id$v=19$m=...,t=...,p=...$salt$digest`) so the
//! salt and cost travel with the digest. The cost is the Argon2 default and is
//! deliberately slow; callers on an async runtime should hash on the blocking pool.

use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use std::sync::OnceLock;
use thiserror::Error;

/// Longest plaintext accepted, in bytes.
pub const MAX_PASSWORD_BYTES: usize = 1024;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("password exceeds {MAX_PASSWORD_BYTES} bytes")]
    TooLong,
    #[error("password hashing failed: {0}")]
    Hash(password_hash::Error),
    #[error("malformed password hash: {0}")]
    MalformedHash(password_hash::Error),
    #[error("hashing task was interrupted")]
    Interrupted,
}

/// Hash `password` with a fresh random salt.
///
/// # Errors
/// Returns [`PasswordError::TooLong`] past [`MAX_PASSWORD_BYTES`], or
/// [`PasswordError::Hash`] if Argon2 rejects the input.
pub fn hash(password: &str) -> Result<String, PasswordError> {
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(PasswordError::TooLong);
    }

    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(PasswordError::Hash)
}

/// Check `password` against a stored PHC string in constant time.
///
/// A wrong password is `Ok(false)`, never an error.
///
/// # Errors
/// Returns [`PasswordError::MalformedHash`] if `hash` is not a usable PHC string.
pub fn verify(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed = PasswordHash::new(hash).map_err(PasswordError::MalformedHash)?;

    // Anything this long was never hashed by us.
    if password.len() > MAX_PASSWORD_BYTES {
        return Ok(false);
    }

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::MalformedHash(e)),
    }
}

/// Hash checked in place of a stored one when the email is unknown, so both
/// login failures cost one Argon2 verification. Computed on first use.
pub(crate) fn dummy_hash() -> &'static str {
    static DUMMY: OnceLock<String> = OnceLock::new();
    DUMMY.get_or_init(|| hash("warden-unknown-user").unwrap_or_default())
}
