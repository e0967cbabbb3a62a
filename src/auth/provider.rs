//! Google OAuth identity provider
//!
//! Implements the OAuth 2.0 authorization code flow against Google's
//! token and userinfo endpoints.

use serde::{Deserialize, Serialize};

use crate::config::AuthConfig;
use crate::error::AppError;

/// Provider id stored alongside linked accounts
pub const GOOGLE_PROVIDER_ID: &str = "google";

const SCOPES: &str = "openid email profile";

/// Profile claims returned by Google for a verified sign-in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfile {
    /// Google subject identifier
    pub subject: String,
    pub email: String,
    pub name: Option<String>,
    pub picture: Option<String>,
}

/// Google OAuth client
#[derive(Debug, Clone)]
pub struct GoogleProvider {
    http_client: reqwest::Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    authorize_url: String,
    token_url: String,
    userinfo_url: String,
}

#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    code: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
    redirect_uri: &'a str,
    grant_type: &'a str,
}

#[derive(Debug, Deserialize)]
struct GoogleTokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    sub: String,
    email: Option<String>,
    email_verified: Option<bool>,
    name: Option<String>,
    picture: Option<String>,
}

impl GoogleProvider {
    pub fn new(config: &AuthConfig, http_client: reqwest::Client) -> Self {
        Self {
            http_client,
            client_id: config.google.client_id.clone(),
            client_secret: config.google.client_secret.clone(),
            redirect_uri: config.redirect_uri(),
            authorize_url: config.google.authorize_url.clone(),
            token_url: config.google.token_url.clone(),
            userinfo_url: config.google.userinfo_url.clone(),
        }
    }

    /// URL the browser is sent to for consent
    ///
    /// # Arguments
    /// * `state` - CSRF token echoed back on the callback
    pub fn authorization_url(&self, state: &str) -> Result<String, AppError> {
        let mut url = url::Url::parse(&self.authorize_url).map_err(|e| {
            AppError::Config(format!("auth.google.authorize_url is invalid: {e}"))
        })?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", SCOPES)
            .append_pair("state", state);
        Ok(url.into())
    }

    /// Exchange an authorization code for the user's verified profile
    ///
    /// # Errors
    /// `IdentityProvider` when Google rejects the code, answers with an
    /// unexpected body, or the account has no verified email.
    pub async fn exchange_code(&self, code: &str) -> Result<ProviderProfile, AppError> {
        let token_response = self
            .http_client
            .post(&self.token_url)
            .form(&TokenRequest {
                code,
                client_id: &self.client_id,
                client_secret: &self.client_secret,
                redirect_uri: &self.redirect_uri,
                grant_type: "authorization_code",
            })
            .send()
            .await?;

        if !token_response.status().is_success() {
            let status = token_response.status();
            let body = token_response.text().await.unwrap_or_default();
            tracing::error!(%status, body = %body, "Token exchange failed");
            return Err(AppError::IdentityProvider(format!(
                "token exchange failed with status {status}"
            )));
        }

        let tokens: GoogleTokenResponse = token_response.json().await.map_err(|e| {
            AppError::IdentityProvider(format!("invalid token response: {e}"))
        })?;

        let userinfo_response = self
            .http_client
            .get(&self.userinfo_url)
            .bearer_auth(&tokens.access_token)
            .send()
            .await?;

        if !userinfo_response.status().is_success() {
            let status = userinfo_response.status();
            tracing::error!(%status, "Userinfo request failed");
            return Err(AppError::IdentityProvider(format!(
                "userinfo request failed with status {status}"
            )));
        }

        let info: GoogleUserInfo = userinfo_response.json().await.map_err(|e| {
            AppError::IdentityProvider(format!("invalid userinfo response: {e}"))
        })?;

        let email = info
            .email
            .filter(|email| !email.is_empty())
            .ok_or_else(|| AppError::IdentityProvider("profile has no email".to_string()))?;

        if info.email_verified == Some(false) {
            tracing::warn!(email = %email, "Rejecting sign-in with unverified email");
            return Err(AppError::IdentityProvider(
                "email address is not verified".to_string(),
            ));
        }

        Ok(ProviderProfile {
            subject: info.sub,
            email,
            name: info.name,
            picture: info.picture,
        })
    }
}
