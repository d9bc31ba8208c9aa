use super::{missing_payload, Message};
use crate::{
    auth::{CredentialService, NewUser},
    directory::{Directory, Profile},
};
use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};
use tracing::{debug, instrument};
use utoipa::ToSchema;

#[derive(ToSchema, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRegister {
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
    #[serde(default)]
    username: String,
    email: String,
    password: String,
    #[serde(default)]
    access_code: String,
    #[serde(default)]
    user_type: String,
}

impl fmt::Debug for UserRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserRegister")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"***")
            .field("user_type", &self.user_type)
            .finish_non_exhaustive()
    }
}

impl From<UserRegister> for NewUser {
    fn from(user: UserRegister) -> Self {
        Self {
            profile: Profile {
                first_name: user.first_name,
                last_name: user.last_name,
                username: user.username,
                email: user.email,
                access_code: user.access_code,
                user_type: user.user_type,
            },
            password: SecretString::from(user.password),
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UserCreated {
    message: String,
    user_id: String,
}

#[utoipa::path(
    post,
    path= "/register",
    request_body = UserRegister,
    responses (
        (status = 201, description = "Registration successful", body = UserCreated, content_type = "application/json"),
        (status = 400, description = "Missing or invalid fields", body = Message),
        (status = 409, description = "User with the specified email already exists", body = Message),
    ),
    tag= "register"
)]
#[instrument(skip(service, payload))]
pub async fn register<D: Directory + 'static>(
    service: Extension<Arc<CredentialService<D>>>,
    payload: Option<Json<UserRegister>>,
) -> impl IntoResponse {
    let user: UserRegister = match payload {
        Some(Json(payload)) => payload,
        None => return missing_payload(),
    };

    debug!("user: {:?}", user);

    match service.register(user.into()).await {
        Ok(user_id) => (
            StatusCode::CREATED,
            Json(UserCreated {
                message: "User created successfully".to_string(),
                user_id: user_id.to_string(),
            }),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}
