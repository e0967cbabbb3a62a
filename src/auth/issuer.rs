//! Session issuance
//!
//! Turns a freshly verified identity or an existing token into a new signed
//! token. The two inputs are the two states a session can be in:
//! - first sign-in: the identity provider just vouched for the user
//! - later requests: only the previous token is available, and the user is
//!   re-read from the database by email

use chrono::Duration;

use super::token::{SessionToken, decode_token, encode_token};
use crate::config::AuthConfig;
use crate::data::UserStore;
use crate::error::AppError;
use crate::metrics::{SESSION_ISSUED_TOTAL, SESSION_REFRESH_FAILURES_TOTAL};

/// Identity confirmed by the provider and mapped to a stored user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    /// Stored user id
    pub id: String,
    pub name: Option<String>,
    pub email: String,
    pub image: Option<String>,
}

/// What a new token is derived from
#[derive(Debug, Clone)]
pub enum TokenSource {
    FreshIdentity(VerifiedIdentity),
    ExistingToken(SessionToken),
}

/// Mints, refreshes and verifies session tokens
///
/// Borrows the auth configuration; build one per request with
/// [`SessionIssuer::new`].
#[derive(Debug, Clone, Copy)]
pub struct SessionIssuer<'a> {
    config: &'a AuthConfig,
}

impl<'a> SessionIssuer<'a> {
    pub fn new(config: &'a AuthConfig) -> Self {
        Self { config }
    }

    /// Derive the next token from either source
    ///
    /// # Errors
    /// `UserNotFound` when an existing token's email has no stored user.
    /// Callers must treat that session as invalid.
    pub async fn issue<S>(&self, source: TokenSource, store: &S) -> Result<SessionToken, AppError>
    where
        S: UserStore + ?Sized,
    {
        match source {
            TokenSource::FreshIdentity(identity) => Ok(self.sign_in(&identity)),
            TokenSource::ExistingToken(token) => self.refresh(&token, store).await,
        }
    }

    /// Token for a first sign-in. No database read.
    pub fn sign_in(&self, identity: &VerifiedIdentity) -> SessionToken {
        tracing::debug!(
            stage = "sign_in",
            user_id = %identity.id,
            email = %identity.email,
            "Initial sign-in, issuing session token"
        );
        SESSION_ISSUED_TOTAL.with_label_values(&["sign_in"]).inc();

        self.stamp(SessionToken {
            id: Some(identity.id.clone()),
            name: identity.name.clone(),
            email: Some(identity.email.clone()),
            picture: identity.image.clone(),
            ..SessionToken::default()
        })
    }

    /// Re-derive a token from the stored user matching the token's email.
    ///
    /// Claims of the incoming token other than `email` are ignored, so
    /// profile edits in the database reach the next token.
    pub async fn refresh<S>(&self, token: &SessionToken, store: &S) -> Result<SessionToken, AppError>
    where
        S: UserStore + ?Sized,
    {
        let email = token.email.as_deref().unwrap_or_default();
        tracing::debug!(stage = "refresh", email = %email, "Subsequent token check");

        let user = if email.is_empty() {
            None
        } else {
            store.find_user_by_email(email).await?
        };

        let Some(user) = user else {
            tracing::error!(stage = "refresh", email = %email, "No user found for session email");
            SESSION_REFRESH_FAILURES_TOTAL
                .with_label_values(&["user_not_found"])
                .inc();
            return Err(AppError::UserNotFound {
                email: email.to_string(),
            });
        };

        SESSION_ISSUED_TOTAL.with_label_values(&["refresh"]).inc();

        Ok(self.stamp(SessionToken {
            id: Some(user.id),
            name: user.name,
            email: Some(user.email),
            picture: user.image,
            ..SessionToken::default()
        }))
    }

    /// Sign claims into a cookie value
    pub fn encode(&self, token: &SessionToken) -> Result<String, AppError> {
        encode_token(token, &self.config.secret)
    }

    /// Verify a cookie value
    pub fn decode(&self, value: &str) -> Result<SessionToken, AppError> {
        decode_token(value, &self.config.secret)
    }

    /// Set `iat` to now and `exp` to now plus the session max age.
    ///
    /// An out-of-range max age saturates `exp` instead of panicking.
    fn stamp(&self, mut token: SessionToken) -> SessionToken {
        let now = chrono::Utc::now();
        token.iat = now.timestamp();
        token.exp = Duration::try_seconds(self.config.session_max_age)
            .and_then(|max_age| now.checked_add_signed(max_age))
            .map_or(i64::MAX, |exp| exp.timestamp());
        token
    }
}
