use super::{missing_payload, Message};
use crate::{auth::CredentialService, directory::Directory};
use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};
use tracing::instrument;
use utoipa::ToSchema;

#[derive(ToSchema, Deserialize)]
pub struct UserLogin {
    email: String,
    password: String,
}

impl fmt::Debug for UserLogin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserLogin")
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}

#[derive(ToSchema, Serialize, Deserialize)]
pub struct Token {
    token: String,
}

#[utoipa::path(
    post,
    path= "/login",
    request_body = UserLogin,
    responses (
        (status = 200, description = "Login successful", body = Token, content_type = "application/json"),
        (status = 401, description = "Unknown email or wrong password", body = Message),
    ),
    tag= "login"
)]
#[instrument(skip(service, payload))]
pub async fn login<D: Directory + 'static>(
    service: Extension<Arc<CredentialService<D>>>,
    payload: Option<Json<UserLogin>>,
) -> impl IntoResponse {
    let user: UserLogin = match payload {
        Some(Json(payload)) => payload,
        None => return missing_payload(),
    };

    match service
        .login(&user.email, SecretString::from(user.password))
        .await
    {
        Ok(token) => (StatusCode::OK, Json(Token { token })).into_response(),
        Err(e) => e.into_response(),
    }
}
