use super::{missing_payload, Message};
use crate::{
    auth::{CredentialService, UpdateRequest},
    directory::Directory,
};
use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use serde::Deserialize;
use std::{fmt, sync::Arc};
use tracing::instrument;
use utoipa::ToSchema;

#[derive(ToSchema, Deserialize)]
pub struct UserUpdate {
    token: String,
    email: Option<String>,
    password: Option<String>,
}

impl fmt::Debug for UserUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserUpdate")
            .field("token", &"***")
            .field("email", &self.email)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

#[utoipa::path(
    patch,
    path= "/update",
    request_body = UserUpdate,
    responses (
        (status = 200, description = "Credentials updated", body = Message, content_type = "application/json"),
        (status = 400, description = "Nothing to update or invalid email", body = Message),
        (status = 401, description = "Missing, expired or forged token", body = Message),
        (status = 404, description = "Token subject no longer exists", body = Message),
        (status = 409, description = "Email already in use", body = Message),
    ),
    tag= "update"
)]
#[instrument(skip(service, payload))]
pub async fn update<D: Directory + 'static>(
    service: Extension<Arc<CredentialService<D>>>,
    payload: Option<Json<UserUpdate>>,
) -> impl IntoResponse {
    let update: UserUpdate = match payload {
        Some(Json(payload)) => payload,
        None => return missing_payload(),
    };

    let request = UpdateRequest::new(update.token, update.email, update.password);

    match service.update_credentials(request).await {
        Ok(message) => (StatusCode::OK, Json(Message::new(message))).into_response(),
        Err(e) => e.into_response(),
    }
}
