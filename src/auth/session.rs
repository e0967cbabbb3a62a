//! Request-scoped session view
//!
//! What handlers and the `/api/auth/session` endpoint see. Built from a
//! verified token on every request and dropped afterwards.

use serde::{Deserialize, Serialize};

use super::token::SessionToken;

/// Session exposed to application code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user: SessionUser,
}

/// User part of the session. Missing claims serialize as `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub image: Option<String>,
}

/// Minimal shape handed to older callers that only need the user id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyUser {
    #[serde(rename = "userId")]
    pub user_id: String,
}

impl Session {
    /// Project token claims into the public session shape.
    ///
    /// `picture` becomes `image`; absent claims stay absent.
    pub fn from_token(token: &SessionToken) -> Self {
        Self {
            user: SessionUser {
                id: token.id.clone(),
                name: token.name.clone(),
                email: token.email.clone(),
                image: token.picture.clone(),
            },
        }
    }

    /// `{userId}` view of this session, if it carries an id
    pub fn legacy_user(&self) -> Option<LegacyUser> {
        self.user
            .id
            .clone()
            .map(|user_id| LegacyUser { user_id })
    }
}
