//! # Warden
//!
//! `warden` manages user credentials: it registers users with an Argon2id
//! password hash, exchanges a correct password for a signed session token
//! (HS256 JWT), and lets the token holder change their own email or password.
//!
//! ## Layout
//!
//! - [`directory`]: the user store contract, with Postgres and in-memory backends.
//! - [`auth`]: password hashing, token issuance and verification, and the
//!   [`auth::CredentialService`] use cases.
//! - [`warden`]: the axum HTTP surface.
//! - [`cli`]: argument parsing, logging setup and server bootstrap.
//!
//! Login failures never reveal whether the email exists, and token failures
//! collapse into a single "unauthorized" answer at the HTTP boundary.

pub mod auth;
pub mod cli;
pub mod directory;
pub mod warden;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
