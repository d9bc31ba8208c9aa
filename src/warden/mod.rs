use crate::{auth::CredentialService, directory::Directory};
use anyhow::Result;
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method, Request, StatusCode,
    },
    routing::{get, patch, post},
    Extension, Router,
};
use std::{sync::Arc, time::Duration};
use tokio::{net::TcpListener, signal};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;

pub mod handlers;
pub mod openapi;

use handlers::{health, user_login, user_register, user_update};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Build the HTTP router around a credential service.
pub fn router<D: Directory + 'static>(service: Arc<CredentialService<D>>) -> Router {
    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST, Method::PATCH])
        .allow_origin(Any);

    Router::new()
        .route("/register", post(user_register::register::<D>))
        .route("/login", post(user_login::login::<D>))
        .route("/update", patch(user_update::update::<D>))
        .route("/health", get(health::health::<D>))
        .route("/openapi.json", get(openapi::openapi_json))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(timeout_layer(REQUEST_TIMEOUT))
                .layer(cors),
        )
        .layer(Extension(service))
}

/// Start the server
/// # Errors
/// Return error if failed to bind or serve
pub async fn new<D: Directory + 'static>(port: u16, service: CredentialService<D>) -> Result<()> {
    let app = router(Arc::new(service));

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn timeout_layer(duration: Duration) -> TimeoutLayer {
    TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, duration)
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl-C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => (),
        () = terminate => (),
    }

    info!("Gracefully shutdown");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{auth::TokenSettings, directory::MemoryDirectory};
    use axum::{body::to_bytes, response::Response};
    use secrecy::SecretString;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    type Service = Arc<CredentialService<MemoryDirectory>>;

    fn service() -> Service {
        let settings = match TokenSettings::new(SecretString::from("test-secret".to_string())) {
            Ok(settings) => settings,
            Err(e) => panic!("settings: {e}"),
        };
        Arc::new(CredentialService::new(MemoryDirectory::new(), &settings))
    }

    fn json_request(method: &str, uri: &str, body: &Value) -> anyhow::Result<Request<Body>> {
        Ok(Request::builder()
            .method(method)
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(body)?))?)
    }

    async fn body_json(response: Response) -> anyhow::Result<Value> {
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn registration(email: &str) -> Value {
        json!({
            "firstName": "Alice",
            "lastName": "Liddell",
            "username": "alice",
            "email": email,
            "password": "hunter2",
            "accessCode": "ABC123",
            "userType": "student"
        })
    }

    #[tokio::test]
    async fn register_login_update_over_http() -> anyhow::Result<()> {
        let service = service();
        let app = router(service.clone());

        let response = app
            .clone()
            .oneshot(json_request("POST", "/register", &registration("a@x.com"))?)
            .await?;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert!(response.headers().contains_key("x-request-id"));
        let body = body_json(response).await?;
        assert_eq!(body["message"], "User created successfully");
        assert_eq!(body["userId"], "1");

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/login",
                &json!({"email": "a@x.com", "password": "hunter2"}),
            )?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        let token = body_json(response).await?["token"]
            .as_str()
            .map(str::to_string)
            .unwrap_or_default();
        assert!(!token.is_empty());

        let response = app
            .oneshot(json_request(
                "PATCH",
                "/update",
                &json!({"token": token, "email": "b@x.com"}),
            )?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await?["message"], "user updated successfully");

        let user = service.directory().find_by_id(1).await?;
        assert_eq!(user.email(), "b@x.com");
        Ok(())
    }

    #[tokio::test]
    async fn duplicate_registration_conflicts() -> anyhow::Result<()> {
        let app = router(service());

        let first = app
            .clone()
            .oneshot(json_request("POST", "/register", &registration("a@x.com"))?)
            .await?;
        assert_eq!(first.status(), StatusCode::CREATED);

        let second = app
            .oneshot(json_request("POST", "/register", &registration("a@x.com"))?)
            .await?;
        assert_eq!(second.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(second).await?["message"], "email already exists");
        Ok(())
    }

    #[tokio::test]
    async fn login_failures_are_generic() -> anyhow::Result<()> {
        let app = router(service());
        app.clone()
            .oneshot(json_request("POST", "/register", &registration("a@x.com"))?)
            .await?;

        let wrong = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/login",
                &json!({"email": "a@x.com", "password": "nope"}),
            )?)
            .await?;
        let unknown = app
            .oneshot(json_request(
                "POST",
                "/login",
                &json!({"email": "ghost@x.com", "password": "hunter2"}),
            )?)
            .await?;

        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(wrong).await?, body_json(unknown).await?);
        Ok(())
    }

    #[tokio::test]
    async fn update_with_garbage_token_is_unauthorized() -> anyhow::Result<()> {
        let app = router(service());

        let response = app
            .oneshot(json_request(
                "PATCH",
                "/update",
                &json!({"token": "garbage", "password": "new-password"}),
            )?)
            .await?;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await?["message"], "unauthorized");
        Ok(())
    }

    #[tokio::test]
    async fn missing_payload_is_bad_request() -> anyhow::Result<()> {
        let app = router(service());

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/register")
                    .body(Body::empty())?,
            )
            .await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn store_failure_is_internal_error() -> anyhow::Result<()> {
        let service = service();
        service.directory().set_unavailable(true);
        let app = router(service);

        let response = app
            .oneshot(json_request("POST", "/register", &registration("a@x.com"))?)
            .await?;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await?["message"], "internal server error");
        Ok(())
    }

    #[tokio::test]
    async fn health_reports_store_state() -> anyhow::Result<()> {
        let service = service();
        let app = router(service.clone());

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/health").body(Body::empty())?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("X-App"));
        let body = body_json(response).await?;
        assert_eq!(body["name"], env!("CARGO_PKG_NAME"));
        assert_eq!(body["database"], "ok");

        service.directory().set_unavailable(true);
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty())?)
            .await?;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_json(response).await?["database"], "error");
        Ok(())
    }

    #[tokio::test]
    async fn slow_requests_time_out() -> anyhow::Result<()> {
        let app = Router::new()
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    "done"
                }),
            )
            .layer(timeout_layer(Duration::from_millis(10)));

        let response = app
            .oneshot(Request::builder().uri("/slow").body(Body::empty())?)
            .await?;
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
        Ok(())
    }

    #[tokio::test]
    async fn serves_openapi_document() -> anyhow::Result<()> {
        let app = router(service());

        let response = app
            .oneshot(Request::builder().uri("/openapi.json").body(Body::empty())?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await?;
        assert!(body["paths"]["/register"].is_object());
        assert!(body["paths"]["/update"]["patch"].is_object());
        Ok(())
    }
}
