//! Common test utilities for E2E tests

#![allow(dead_code)]

use axum::{
    Form, Json, Router,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use pantry_auth::auth::{SessionIssuer, SessionToken, VerifiedIdentity};
use pantry_auth::data::{NewUser, User};
use pantry_auth::{AppState, config};
use serde::Deserialize;
use sqlx::SqlitePool;
use tempfile::TempDir;
use tokio::net::TcpListener;

pub const SESSION_COOKIE: &str = "pantry.session-token";
pub const GOOD_CODE: &str = "good-code";
pub const GOOGLE_SUBJECT: &str = "google-sub-1";
pub const GOOGLE_EMAIL: &str = "a@example.com";

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub google_addr: String,
    pub state: AppState,
    pub _temp_dir: TempDir,
    /// Client that does not follow redirects
    pub client: reqwest::Client,
}

impl TestServer {
    /// Create a new test server instance
    pub async fn new() -> Self {
        Self::with_protected_paths(vec!["/dashboard/:path*".to_string()]).await
    }

    pub async fn with_protected_paths(protected_paths: Vec<String>) -> Self {
        let google_addr = spawn(fake_google_router()).await;

        // Create temporary directory for test database
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let config = config::AppConfig {
            server: config::ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            database: config::DatabaseConfig {
                url: format!("sqlite:{}?mode=rwc", db_path.display()),
            },
            auth: config::AuthConfig {
                url: "http://localhost:3000".to_string(),
                secret: "test-secret-key-32-bytes-long!!!".to_string(),
                session_max_age: 2_592_000,
                cookie_name: SESSION_COOKIE.to_string(),
                debug: true,
                google: config::GoogleOAuthConfig {
                    client_id: "test-client-id".to_string(),
                    client_secret: "test-client-secret".to_string(),
                    authorize_url: format!("{google_addr}/authorize"),
                    token_url: format!("{google_addr}/token"),
                    userinfo_url: format!("{google_addr}/userinfo"),
                },
            },
            guard: config::GuardConfig {
                protected_paths,
                landing_route: "/".to_string(),
                after_sign_in: "/dashboard".to_string(),
            },
            logging: config::LoggingConfig {
                level: "debug".to_string(),
                format: "pretty".to_string(),
            },
        };
        config.validate().unwrap();

        let state = AppState::new(config).await.unwrap();
        let addr = spawn(pantry_auth::build_router(state.clone())).await;

        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        Self {
            addr,
            google_addr,
            state,
            _temp_dir: temp_dir,
            client,
        }
    }

    /// Get base URL for requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// Create a user in the database
    pub async fn create_user(&self, email: &str, name: &str, image: Option<&str>) -> User {
        self.state
            .db
            .create_user(&NewUser {
                name: Some(name.to_string()),
                email: email.to_string(),
                image: image.map(ToString::to_string),
            })
            .await
            .unwrap()
    }

    /// Separate connection to the server's database, for changing rows
    /// behind its back
    pub async fn sql(&self) -> SqlitePool {
        SqlitePool::connect(&self.state.config.database.connection_string())
            .await
            .unwrap()
    }

    /// Remove a user and its linked accounts
    pub async fn delete_user(&self, id: &str) {
        let pool = self.sql().await;
        sqlx::query("DELETE FROM accounts WHERE user_id = ?")
            .bind(id)
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&pool)
            .await
            .unwrap();
    }

    /// Change profile fields of a stored user
    pub async fn update_profile(&self, id: &str, name: &str, image: &str) {
        sqlx::query("UPDATE users SET name = ?, image = ? WHERE id = ?")
            .bind(name)
            .bind(image)
            .bind(id)
            .execute(&self.sql().await)
            .await
            .unwrap();
    }

    /// Make every user lookup fail with a database error
    pub async fn break_user_table(&self) {
        sqlx::query("ALTER TABLE users RENAME TO users_unavailable")
            .execute(&self.sql().await)
            .await
            .unwrap();
    }

    /// Issue a token the way first sign-in does
    pub fn token_for(&self, user: &User) -> SessionToken {
        SessionIssuer::new(&self.state.config.auth).sign_in(&VerifiedIdentity {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            image: user.image.clone(),
        })
    }

    /// `Cookie` header value carrying the given token
    pub fn cookie_header(&self, token: &SessionToken) -> String {
        let value = SessionIssuer::new(&self.state.config.auth)
            .encode(token)
            .unwrap();
        format!("{SESSION_COOKIE}={value}")
    }

    /// Decode a session cookie value set by the server
    pub fn decode(&self, value: &str) -> SessionToken {
        SessionIssuer::new(&self.state.config.auth)
            .decode(value)
            .unwrap()
    }
}

/// Bind a router to an ephemeral port and serve it in the background
async fn spawn(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}

/// All `Set-Cookie` header values of a response
pub fn set_cookies(response: &reqwest::Response) -> Vec<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok().map(ToString::to_string))
        .collect()
}

/// Value of the named cookie in the `Set-Cookie` headers
pub fn cookie_value(response: &reqwest::Response, name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    set_cookies(response).into_iter().find_map(|cookie| {
        cookie
            .strip_prefix(&prefix)
            .map(|rest| rest.split(';').next().unwrap_or_default().to_string())
    })
}

/// Location header of a redirect
pub fn location(response: &reqwest::Response) -> String {
    response
        .headers()
        .get("location")
        .and_then(|v| v.to_str().ok())
        .expect("location header")
        .to_string()
}

// =============================================================================
// Fake Google
// =============================================================================

#[derive(Debug, Deserialize)]
struct TokenForm {
    code: String,
    client_id: String,
    client_secret: String,
    grant_type: String,
}

fn fake_google_router() -> Router {
    Router::new()
        .route("/token", post(fake_token))
        .route("/userinfo", get(fake_userinfo))
}

async fn fake_token(Form(form): Form<TokenForm>) -> Response {
    let valid = form.code == GOOD_CODE
        && form.client_id == "test-client-id"
        && form.client_secret == "test-client-secret"
        && form.grant_type == "authorization_code";

    if !valid {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "invalid_grant" })),
        )
            .into_response();
    }

    Json(serde_json::json!({
        "access_token": "fake-access-token",
        "expires_in": 3599,
        "token_type": "Bearer"
    }))
    .into_response()
}

async fn fake_userinfo(headers: HeaderMap) -> Response {
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        == Some("Bearer fake-access-token");

    if !authorized {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    Json(serde_json::json!({
        "sub": GOOGLE_SUBJECT,
        "email": GOOGLE_EMAIL,
        "email_verified": true,
        "name": "A",
        "picture": "img.png"
    }))
    .into_response()
}
