//! HS256 session tokens (JWT).
//!
//! A token asserts that its holder proved knowledge of the subject's password
//! when it was issued. Tokens are stateless: nothing is stored server-side and
//! they stop verifying once `exp` has passed.

use super::UserId;
use base64ct::{Base64UrlUnpadded, Encoding};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::SystemTime,
};
use thiserror::Error;
use tracing::warn;

/// Value of the `iss` claim on every token this service mints.
pub const TOKEN_ISSUER: &str = "auth.warden.dev";

pub const DEFAULT_EXPIRATION_HOURS: u64 = 24;

const HMAC_ALGORITHMS: [Algorithm; 3] = [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("signing secret is empty")]
    MissingSecret,
    #[error("failed to sign token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
    #[error("invalid token format")]
    Malformed,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("invalid issuer")]
    InvalidIssuer,
    #[error("token expired")]
    Expired,
}

/// Signing secret plus lifetime of newly issued tokens.
///
/// The lifetime is shared with every [`TokenIssuer`] built from these settings
/// and read on each issue, so [`TokenSettings::set_expiration_hours`] applies
/// to the next token without rebuilding anything.
#[derive(Clone)]
pub struct TokenSettings {
    secret: SecretString,
    expiration_hours: Arc<AtomicU64>,
}

impl TokenSettings {
    /// # Errors
    /// Returns [`TokenError::MissingSecret`] if `secret` is empty.
    pub fn new(secret: SecretString) -> Result<Self, TokenError> {
        if secret.expose_secret().is_empty() {
            return Err(TokenError::MissingSecret);
        }

        Ok(Self {
            secret,
            expiration_hours: Arc::new(AtomicU64::new(DEFAULT_EXPIRATION_HOURS)),
        })
    }

    #[must_use]
    pub fn with_expiration_hours(self, hours: u64) -> Self {
        self.set_expiration_hours(hours);
        self
    }

    /// Change the lifetime of tokens issued from now on. Zero means the default.
    pub fn set_expiration_hours(&self, hours: u64) {
        let hours = if hours == 0 {
            DEFAULT_EXPIRATION_HOURS
        } else {
            hours
        };
        self.expiration_hours.store(hours, Ordering::Relaxed);
    }

    #[must_use]
    pub fn expiration_hours(&self) -> u64 {
        self.expiration_hours.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for TokenSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSettings")
            .field("secret", &"***")
            .field("expiration_hours", &self.expiration_hours())
            .finish()
    }
}

/// Parse a configured expiration window in hours.
///
/// Unset, unparsable or zero values fall back to [`DEFAULT_EXPIRATION_HOURS`].
#[must_use]
pub fn parse_expiration_hours(value: Option<&str>) -> u64 {
    let Some(raw) = value.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return DEFAULT_EXPIRATION_HOURS;
    };

    match raw.parse::<u64>() {
        Ok(hours) if hours > 0 => hours,
        _ => {
            warn!(
                "Invalid token expiration '{}', using {} hours",
                raw, DEFAULT_EXPIRATION_HOURS
            );
            DEFAULT_EXPIRATION_HOURS
        }
    }
}

pub(crate) fn now_unix_seconds() -> i64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

#[derive(Clone)]
pub struct TokenIssuer {
    key: EncodingKey,
    expiration_hours: Arc<AtomicU64>,
}

impl TokenIssuer {
    #[must_use]
    pub fn new(settings: &TokenSettings) -> Self {
        Self {
            key: EncodingKey::from_secret(settings.secret.expose_secret().as_bytes()),
            expiration_hours: Arc::clone(&settings.expiration_hours),
        }
    }

    /// Mint a token for `user_id`, valid from now.
    ///
    /// # Errors
    /// Returns [`TokenError::Signing`] if the claims cannot be signed.
    pub fn issue(&self, user_id: UserId) -> Result<String, TokenError> {
        self.issue_at(user_id, now_unix_seconds())
    }

    /// Mint a token as if the current time were `now` (unix seconds).
    ///
    /// # Errors
    /// Returns [`TokenError::Signing`] if the claims cannot be signed.
    pub fn issue_at(&self, user_id: UserId, now: i64) -> Result<String, TokenError> {
        let hours = self.expiration_hours.load(Ordering::Relaxed);
        let lifetime = i64::try_from(hours.saturating_mul(3600)).unwrap_or(i64::MAX);
        let claims = Claims {
            sub: user_id.to_string(),
            iss: TOKEN_ISSUER.to_string(),
            iat: now,
            exp: now.saturating_add(lifetime),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.key).map_err(TokenError::Signing)
    }
}

impl fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("key", &"***")
            .field("expiration_hours", &self.expiration_hours.load(Ordering::Relaxed))
            .finish()
    }
}

#[derive(Deserialize)]
struct RawHeader {
    alg: String,
}

#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    #[must_use]
    pub fn new(settings: &TokenSettings) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = HMAC_ALGORITHMS.to_vec();
        validation.leeway = 0;
        validation.set_issuer(&[TOKEN_ISSUER]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);

        Self {
            key: DecodingKey::from_secret(settings.secret.expose_secret().as_bytes()),
            validation,
        }
    }

    /// Check signature, algorithm, issuer and expiry, and return the claims.
    ///
    /// # Errors
    /// - [`TokenError::Malformed`] if the token is not a well-formed JWT,
    /// - [`TokenError::InvalidSignature`] if the algorithm is not HMAC or the
    ///   signature does not match,
    /// - [`TokenError::InvalidIssuer`] if it was minted by someone else,
    /// - [`TokenError::Expired`] once `exp` has passed.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        ensure_hmac_header(token)?;

        decode::<Claims>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidSignature
                | ErrorKind::InvalidAlgorithm
                | ErrorKind::InvalidAlgorithmName => TokenError::InvalidSignature,
                ErrorKind::InvalidIssuer => TokenError::InvalidIssuer,
                _ => TokenError::Malformed,
            })
    }
}

impl fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("key", &"***")
            .field("algorithms", &self.validation.algorithms)
            .finish()
    }
}

// Reject `none` and asymmetric algorithms before the library parses the header,
// so they surface as signature failures rather than format errors.
fn ensure_hmac_header(token: &str) -> Result<(), TokenError> {
    let header_b64 = token.split('.').next().ok_or(TokenError::Malformed)?;
    let bytes = Base64UrlUnpadded::decode_vec(header_b64).map_err(|_| TokenError::Malformed)?;
    let header: RawHeader = serde_json::from_slice(&bytes).map_err(|_| TokenError::Malformed)?;

    if matches!(header.alg.parse::<Algorithm>(), Ok(alg) if HMAC_ALGORITHMS.contains(&alg)) {
        Ok(())
    } else {
        Err(TokenError::InvalidSignature)
    }
}
