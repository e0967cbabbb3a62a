//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration file (config/default.toml, config/local.toml)
//! 3. Environment variables (PANTRY__*)
//! 4. Deployment variables (NEXTAUTH_SECRET, NEXTAUTH_URL, GOOGLE_ID,
//!    GOOGLE_SECRET, DATABASE_URL), which win over everything else

use serde::Deserialize;

use crate::auth::{AUTH_ROUTES, PathPattern};
use crate::error::AppError;

/// Upper bound for `auth.session_max_age` (ten years)
pub const MAX_SESSION_MAX_AGE_SECS: i64 = 10 * 365 * 86_400;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub guard: GuardConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 8080)
    pub port: u16,
}

/// Database configuration (SQLite only)
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `sqlite:` connection string or a plain file path
    pub url: String,
}

impl DatabaseConfig {
    /// Connection string accepted by sqlx
    pub fn connection_string(&self) -> String {
        if self.url.starts_with("sqlite:") {
            self.url.clone()
        } else {
            format!("sqlite:{}?mode=rwc", self.url)
        }
    }
}

/// Session and sign-in configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Public base URL of the site (e.g., "https://pantry.example.com")
    pub url: String,
    /// Shared secret used to sign session tokens
    #[serde(default)]
    pub secret: String,
    /// Session max age in seconds (default: 2592000 = 30 days)
    pub session_max_age: i64,
    /// Name of the session cookie
    pub cookie_name: String,
    /// Verbose auth diagnostics
    #[serde(default)]
    pub debug: bool,
    pub google: GoogleOAuthConfig,
}

impl AuthConfig {
    /// OAuth callback URL registered with Google
    pub fn redirect_uri(&self) -> String {
        format!(
            "{}/api/auth/callback/google",
            self.url.trim_end_matches('/')
        )
    }

    /// Whether cookies should carry the `Secure` attribute
    pub fn should_use_secure_cookies(&self) -> bool {
        url::Url::parse(&self.url)
            .map(|url| url.scheme() == "https")
            .unwrap_or(false)
    }
}

/// Google OAuth configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleOAuthConfig {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    pub authorize_url: String,
    pub token_url: String,
    pub userinfo_url: String,
}

/// Route protection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GuardConfig {
    /// Matcher patterns, e.g. "/dashboard/:path*"
    pub protected_paths: Vec<String>,
    /// Where unauthenticated requests to protected paths are sent
    pub landing_route: String,
    /// Where a successful sign-in lands
    pub after_sign_in: String,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Errors
    /// Returns error if configuration is invalid or a required
    /// secret/credential is missing
    pub fn load() -> Result<Self, AppError> {
        use config::{Config, Environment, File};

        let env = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());

        let config = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("database.url", "data/pantry.db")?
            .set_default("auth.url", "http://localhost:8080")?
            .set_default("auth.session_max_age", 2_592_000)?
            .set_default("auth.cookie_name", "pantry.session-token")?
            .set_default("auth.debug", false)?
            .set_default(
                "auth.google.authorize_url",
                "https://accounts.google.com/o/oauth2/v2/auth",
            )?
            .set_default("auth.google.token_url", "https://oauth2.googleapis.com/token")?
            .set_default(
                "auth.google.userinfo_url",
                "https://openidconnect.googleapis.com/v1/userinfo",
            )?
            .set_default("guard.protected_paths", vec!["/dashboard/:path*"])?
            .set_default("guard.landing_route", "/")?
            .set_default("guard.after_sign_in", "/dashboard")?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("PANTRY")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("guard.protected_paths")
                    .try_parsing(true),
            )
            .set_override_option("auth.secret", env("NEXTAUTH_SECRET"))?
            .set_override_option("auth.url", env("NEXTAUTH_URL"))?
            .set_override_option("auth.google.client_id", env("GOOGLE_ID"))?
            .set_override_option("auth.google.client_secret", env("GOOGLE_SECRET"))?
            .set_override_option("database.url", env("DATABASE_URL"))?
            .build()?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    /// Fail-fast checks run once at startup.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.auth.google.client_id.trim().is_empty()
            || self.auth.google.client_secret.trim().is_empty()
        {
            return Err(AppError::Config(
                "Missing GOOGLE_ID or GOOGLE_SECRET for Google OAuth".to_string(),
            ));
        }

        if self.auth.secret.is_empty() {
            return Err(AppError::Config("Missing NEXTAUTH_SECRET".to_string()));
        }

        if !(1..=MAX_SESSION_MAX_AGE_SECS).contains(&self.auth.session_max_age) {
            return Err(AppError::Config(format!(
                "auth.session_max_age must be between 1 and {MAX_SESSION_MAX_AGE_SECS} seconds"
            )));
        }

        match url::Url::parse(&self.auth.url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => {
                return Err(AppError::Config(format!(
                    "auth.url must be an absolute http(s) URL, got {:?}",
                    self.auth.url
                )));
            }
        }

        if self.guard.protected_paths.is_empty() {
            return Err(AppError::Config(
                "guard.protected_paths must contain at least one pattern".to_string(),
            ));
        }
        for raw in &self.guard.protected_paths {
            let pattern = PathPattern::parse(raw)?;
            if pattern.matches(&self.guard.landing_route) {
                return Err(AppError::Config(format!(
                    "protected path {raw:?} covers guard.landing_route {:?}",
                    self.guard.landing_route
                )));
            }
            if let Some(route) = AUTH_ROUTES.iter().find(|route| pattern.matches(route)) {
                return Err(AppError::Config(format!(
                    "protected path {raw:?} covers sign-in route {route:?}"
                )));
            }
        }

        for (key, route) in [
            ("guard.landing_route", &self.guard.landing_route),
            ("guard.after_sign_in", &self.guard.after_sign_in),
        ] {
            if !route.starts_with('/') {
                return Err(AppError::Config(format!(
                    "{key} must be an absolute path, got {route:?}"
                )));
            }
        }

        Ok(())
    }

    /// Log settings that are accepted but weak.
    ///
    /// Called after the subscriber is installed so the warnings are visible.
    pub fn warn_on_weak_settings(&self) {
        const RECOMMENDED_SECRET_BYTES: usize = 32;

        if self.auth.secret.len() < RECOMMENDED_SECRET_BYTES {
            tracing::warn!(
                min_bytes = RECOMMENDED_SECRET_BYTES,
                "NEXTAUTH_SECRET is shorter than recommended"
            );
        }

        if !self.auth.should_use_secure_cookies() {
            tracing::warn!(
                url = %self.auth.url,
                "Using insecure session cookies; auth.url is not https"
            );
        }
    }
}
