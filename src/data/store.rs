//! User lookup seam used by the session issuer

use async_trait::async_trait;

use super::models::User;
use crate::error::AppError;

/// Read access to persisted users.
///
/// The session issuer only ever needs the email lookup; keeping it behind a
/// trait lets the refresh path run against any store.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Find the user whose email matches exactly
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;
}
