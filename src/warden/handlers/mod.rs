//! HTTP handlers and the mapping from [`AuthError`] to responses.

pub mod health;
pub mod user_login;
pub mod user_register;
pub mod user_update;

use crate::auth::AuthError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::ToSchema;

/// Body of every error response and of plain success messages.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Message {
    pub message: String,
}

impl Message {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub(crate) fn missing_payload() -> Response {
    (StatusCode::BAD_REQUEST, Json(Message::new("Missing payload"))).into_response()
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::DuplicateEmail | Self::EmailInUse | Self::UpdateConflict => StatusCode::CONFLICT,
            Self::InvalidCredentials | Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::UserNotFound => StatusCode::NOT_FOUND,
            Self::Persistence(_) | Self::Hashing(_) | Self::TokenIssuance(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let message = match &self {
            Self::Validation(reason) => reason.clone(),
            Self::InvalidCredentials | Self::Unauthorized => "unauthorized".to_string(),
            e if e.is_internal() => {
                error!("Request failed: {:?}", e);
                "internal server error".to_string()
            }
            e => e.to_string(),
        };

        (status, Json(Message::new(message))).into_response()
    }
}
