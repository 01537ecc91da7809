//! Axum-based HTTP gateway for the list API.
//!
//! - `POST /api/register`, `POST /api/login` are public
//! - every other `/api` route requires `Authorization: Bearer <token>`
//! - unmatched GETs serve the embedded UI
//!
//! Request bodies are capped at 64KB and requests time out after 30s.

pub mod assets;

use crate::auth::{
    AccountStore, AuthError, HmacTokenSigner, PasswordHasher, Sha256Hasher, TokenSigner,
};
use crate::config::Config;
use crate::list::{Item, ItemPatch, ListError, ListStore, NewItem};
use crate::storage::{self, Storage};
use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

/// Maximum request body size (64KB)
pub const MAX_BODY_SIZE: usize = 65_536;
/// Request timeout (30s)
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Shared state for all axum handlers
#[derive(Clone)]
pub struct AppState {
    pub accounts: Arc<AccountStore>,
    pub lists: Arc<ListStore>,
}

impl AppState {
    /// Wire both stores onto one storage backend.
    pub fn new(
        storage: Arc<dyn Storage>,
        hasher: Arc<dyn PasswordHasher>,
        signer: Arc<dyn TokenSigner>,
        token_ttl: Duration,
    ) -> Self {
        Self {
            accounts: Arc::new(AccountStore::new(
                Arc::clone(&storage),
                hasher,
                signer,
                token_ttl,
            )),
            lists: Arc::new(ListStore::new(storage)),
        }
    }

    /// Build the state the server runs with: file storage under the
    /// configured data directory plus the configured secret and hashing cost.
    pub fn from_config(config: &Config) -> Result<Self> {
        let storage = storage::create_storage(&config.storage.data_dir).with_context(|| {
            format!(
                "Failed to open data directory {}",
                config.storage.data_dir.display()
            )
        })?;

        let signer = match config.token_secret() {
            Some(secret) => HmacTokenSigner::new(secret.as_bytes()),
            None => {
                tracing::warn!(
                    "No token secret configured, using a random one; sessions end on restart"
                );
                HmacTokenSigner::random()
            }
        };

        let state = Self::new(
            storage,
            Arc::new(Sha256Hasher::with_iterations(config.auth.hash_iterations)),
            Arc::new(signer),
            Duration::from_secs(config.auth.token_ttl_secs),
        );
        let users = state
            .accounts
            .user_count()
            .context("Failed to read the account map")?;
        tracing::info!(users, "Account store loaded");
        Ok(state)
    }
}

/// Build the router with CORS, body-limit and timeout layers.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    Router::new()
        .route("/api/register", post(handle_register))
        .route("/api/login", post(handle_login))
        .route("/api/list", get(handle_list))
        .route("/api/item", post(handle_add_item))
        .route(
            "/api/item/{id}",
            put(handle_update_item).delete(handle_delete_item),
        )
        .route("/api/export", get(handle_export))
        .fallback(assets::handle_static)
        .with_state(state)
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
        ))
}

/// Run the HTTP gateway until Ctrl+C / SIGTERM.
pub async fn run_gateway(config: Config) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.gateway.host, config.gateway.port)
        .parse()
        .with_context(|| {
            format!(
                "Invalid listen address {}:{}",
                config.gateway.host, config.gateway.port
            )
        })?;

    let state = AppState::from_config(&config)?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Watchlist listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
        tracing::info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                tracing::info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// ERRORS
// ══════════════════════════════════════════════════════════════════════════════

/// Client-facing failure, rendered as `{"error": message}`.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("{0}")]
    NotFound(String),

    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({"error": self.to_string()}));
        (self.status(), body).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingCredentials
            | AuthError::UsernameTaken
            | AuthError::UserNotFound
            | AuthError::WrongPassword => ApiError::BadRequest(err.to_string()),
            AuthError::InvalidToken(_) => ApiError::Unauthorized("Invalid token"),
            AuthError::Storage(e) => {
                tracing::error!("Account storage failure: {e}");
                ApiError::Internal
            }
        }
    }
}

impl From<ListError> for ApiError {
    fn from(err: ListError) -> Self {
        match err {
            ListError::MissingTitle => ApiError::BadRequest(err.to_string()),
            ListError::ItemNotFound(_) => ApiError::NotFound(err.to_string()),
            ListError::Storage(e) => {
                tracing::error!("List storage failure: {e}");
                ApiError::Internal
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(format!("Invalid request: {}", rejection.body_text()))
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// AUTH HANDLERS
// ══════════════════════════════════════════════════════════════════════════════

/// Request body for registration and login. Missing fields are caught by
/// the store so they get the same message as blank ones.
#[derive(Debug, Default, Deserialize)]
struct CredentialsBody {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

impl CredentialsBody {
    fn parts(&self) -> (&str, &str) {
        (
            self.username.as_deref().unwrap_or_default(),
            self.password.as_deref().unwrap_or_default(),
        )
    }
}

/// Resolve the bearer token in `headers` to a username.
fn require_user(state: &AppState, headers: &HeaderMap) -> Result<String, ApiError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(ApiError::Unauthorized("No token"))?;
    let value = value
        .to_str()
        .map_err(|_| ApiError::Unauthorized("Malformed token"))?;

    let mut parts = value.split(' ');
    let token = match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None)
            if scheme.eq_ignore_ascii_case("Bearer") && !token.is_empty() =>
        {
            token
        }
        _ => return Err(ApiError::Unauthorized("Malformed token")),
    };

    Ok(state.accounts.authenticate(token)?)
}

/// POST /api/register: create a new account.
async fn handle_register(
    State(state): State<AppState>,
    body: Result<Json<CredentialsBody>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Json(body) = body?;
    let (username, password) = body.parts();
    state.accounts.register(username, password)?;

    Ok(Json(serde_json::json!({"ok": true, "message": "User created"})))
}

/// POST /api/login: check credentials and issue a bearer token.
async fn handle_login(
    State(state): State<AppState>,
    body: Result<Json<CredentialsBody>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Json(body) = body?;
    let (username, password) = body.parts();
    let token = state.accounts.verify(username, password)?;

    Ok(Json(serde_json::json!({
        "ok": true,
        "token": token.token,
        "username": token.username,
    })))
}

// ══════════════════════════════════════════════════════════════════════════════
// LIST HANDLERS
// ══════════════════════════════════════════════════════════════════════════════

/// GET /api/list
async fn handle_list(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Item>>, ApiError> {
    let username = require_user(&state, &headers)?;
    Ok(Json(state.lists.list(&username)?))
}

/// GET /api/export. Same payload as `/api/list`; the UI saves it as a file.
async fn handle_export(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Item>>, ApiError> {
    let username = require_user(&state, &headers)?;
    Ok(Json(state.lists.export(&username)?))
}

/// POST /api/item
async fn handle_add_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<NewItem>, JsonRejection>,
) -> Result<Json<Item>, ApiError> {
    let username = require_user(&state, &headers)?;
    let Json(new) = body?;
    Ok(Json(state.lists.add_item(&username, new)?))
}

/// PUT /api/item/{id}
async fn handle_update_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Result<Json<ItemPatch>, JsonRejection>,
) -> Result<Json<Item>, ApiError> {
    let username = require_user(&state, &headers)?;
    let Json(patch) = body?;
    Ok(Json(state.lists.update_item(&username, &id, patch)?))
}

/// DELETE /api/item/{id}. Succeeds whether or not the item existed.
async fn handle_delete_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let username = require_user(&state, &headers)?;
    state.lists.delete_item(&username, &id)?;
    Ok(Json(serde_json::json!({"ok": true})))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn test_app() -> Router {
        let state = AppState::new(
            Arc::new(MemoryStorage::new()),
            Arc::new(Sha256Hasher::with_iterations(100)),
            Arc::new(HmacTokenSigner::new(b"gateway-test-secret".to_vec())),
            Duration::from_secs(crate::auth::DEFAULT_TOKEN_TTL_SECS),
        );
        build_router(state)
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(value) => {
                request = request.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        let response = app
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn login(app: &Router, username: &str) -> String {
        let creds = json!({"username": username, "password": "pw"});
        let (status, _) = send(app, Method::POST, "/api/register", None, Some(creds.clone())).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = send(app, Method::POST, "/api/login", None, Some(creds)).await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_owned()
    }

    #[test]
    fn security_body_limit_is_64kb() {
        assert_eq!(MAX_BODY_SIZE, 65_536);
    }

    #[test]
    fn app_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }

    #[test]
    fn from_config_opens_data_dir() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut config = Config::default();
        config.storage.data_dir = tmp.path().join("data");
        config.auth.hash_iterations = 10;

        let state = AppState::from_config(&config).unwrap();
        state.accounts.register("alice", "pw").unwrap();
        assert!(tmp.path().join("data").join("users.json").is_file());
    }

    #[test]
    fn raising_hash_iterations_keeps_existing_logins() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut config = Config::default();
        config.storage.data_dir = tmp.path().to_path_buf();
        config.auth.hash_iterations = 10;
        AppState::from_config(&config)
            .unwrap()
            .accounts
            .register("alice", "pw")
            .unwrap();

        config.auth.hash_iterations = 25;
        let state = AppState::from_config(&config).unwrap();
        assert!(state.accounts.verify("alice", "pw").is_ok());
    }

    #[test]
    fn from_config_rejects_corrupt_account_map() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join("users.json"), "{not json").unwrap();

        let mut config = Config::default();
        config.storage.data_dir = tmp.path().to_path_buf();
        assert!(AppState::from_config(&config).is_err());
    }

    #[tokio::test]
    async fn register_then_login() {
        let app = test_app();
        let creds = json!({"username": "alice", "password": "pw"});

        let (status, body) =
            send(&app, Method::POST, "/api/register", None, Some(creds.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        assert!(body["message"].is_string());

        let (status, body) = send(&app, Method::POST, "/api/login", None, Some(creds)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        assert_eq!(body["username"], "alice");
        assert!(body["token"].as_str().is_some_and(|t| !t.is_empty()));
    }

    #[tokio::test]
    async fn register_twice_is_bad_request() {
        let app = test_app();
        login(&app, "alice").await;

        let creds = json!({"username": "alice", "password": "other"});
        let (status, body) = send(&app, Method::POST, "/api/register", None, Some(creds)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("already exists"));
    }

    #[tokio::test]
    async fn register_missing_fields_is_bad_request() {
        let app = test_app();
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/register",
            None,
            Some(json!({"username": "alice"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("required"));
    }

    #[tokio::test]
    async fn login_failures_are_bad_request() {
        let app = test_app();
        login(&app, "alice").await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/login",
            None,
            Some(json!({"username": "alice", "password": "nope"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "wrong password");

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/login",
            None,
            Some(json!({"username": "ghost", "password": "pw"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "user not found");
    }

    #[tokio::test]
    async fn malformed_json_is_bad_request() {
        let app = test_app();
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn list_routes_require_a_token() {
        let app = test_app();
        for uri in ["/api/list", "/api/export"] {
            let (status, body) = send(&app, Method::GET, uri, None, None).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(body["error"], "No token");
        }
        let (status, _) = send(&app, Method::DELETE, "/api/item/x", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn malformed_and_invalid_tokens_are_rejected() {
        let app = test_app();

        let request = Request::builder()
            .uri("/api/list")
            .header(header::AUTHORIZATION, "justonepart")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "Malformed token");

        let (status, body) = send(&app, Method::GET, "/api/list", Some("forged.token"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid token");
    }

    #[tokio::test]
    async fn token_from_another_secret_is_rejected() {
        let app = test_app();
        login(&app, "alice").await;

        let foreign = HmacTokenSigner::new(b"someone-else".to_vec())
            .sign(&crate::auth::Claims::new("alice", Duration::from_secs(60)))
            .unwrap();
        let (status, _) = send(&app, Method::GET, "/api/list", Some(&foreign), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn new_account_starts_with_empty_list() {
        let app = test_app();
        let token = login(&app, "alice").await;

        let (status, body) = send(&app, Method::GET, "/api/list", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn item_crud_flow() {
        let app = test_app();
        let token = login(&app, "alice").await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/item",
            Some(&token),
            Some(json!({"title": "Dark", "seasons": "3"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let id = body["id"].as_str().unwrap().to_owned();
        assert_eq!(body["title"], "Dark");
        assert_eq!(body["seasons"], "3");
        assert_eq!(body["episodes"], "");
        assert_eq!(body["watched"], false);

        let (status, body) = send(
            &app,
            Method::PUT,
            &format!("/api/item/{id}"),
            Some(&token),
            Some(json!({"watched": true})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["watched"], true);
        assert_eq!(body["title"], "Dark");
        assert_eq!(body["seasons"], "3");

        let (status, body) = send(&app, Method::GET, "/api/export", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!([{"id": id, "title": "Dark", "seasons": "3", "episodes": "", "watched": true}])
        );

        let (status, body) = send(
            &app,
            Method::DELETE,
            &format!("/api/item/{id}"),
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"ok": true}));

        let (_, body) = send(&app, Method::GET, "/api/list", Some(&token), None).await;
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn add_without_title_is_bad_request() {
        let app = test_app();
        let token = login(&app, "alice").await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/item",
            Some(&token),
            Some(json!({"title": "   ", "seasons": "1"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "title is required");
    }

    #[tokio::test]
    async fn update_unknown_item_is_not_found() {
        let app = test_app();
        let token = login(&app, "alice").await;

        let (status, body) = send(
            &app,
            Method::PUT,
            "/api/item/nope",
            Some(&token),
            Some(json!({"watched": true})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "item not found");
    }

    #[tokio::test]
    async fn delete_unknown_item_is_ok() {
        let app = test_app();
        let token = login(&app, "alice").await;

        let (status, body) = send(&app, Method::DELETE, "/api/item/nope", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"ok": true}));
    }

    #[tokio::test]
    async fn users_cannot_see_each_other() {
        let app = test_app();
        let alice = login(&app, "alice").await;
        let bob = login(&app, "bob").await;

        let (_, item) = send(
            &app,
            Method::POST,
            "/api/item",
            Some(&alice),
            Some(json!({"title": "Dark"})),
        )
        .await;
        let id = item["id"].as_str().unwrap();

        let (_, body) = send(&app, Method::GET, "/api/list", Some(&bob), None).await;
        assert_eq!(body, json!([]));

        let (status, _) = send(
            &app,
            Method::PUT,
            &format!("/api/item/{id}"),
            Some(&bob),
            Some(json!({"title": "Hijacked"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unmatched_get_serves_the_ui() {
        let app = test_app();
        let request = Request::builder()
            .uri("/some/client/route")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/html");
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert!(String::from_utf8_lossy(&bytes).contains("<html"));
    }
}
