//! SQLite database operations
//!
//! All database access goes through this module.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Sqlite, SqlitePool};

use super::models::*;
use super::store::UserStore;
use crate::error::AppError;

/// Database connection pool wrapper
pub struct Database {
    pub(super) pool: Pool<Sqlite>,
}

impl Database {
    /// Connect to SQLite database and run migrations
    ///
    /// # Arguments
    /// * `connection_string` - sqlx SQLite URL, e.g. `sqlite:data/pantry.db?mode=rwc`
    pub async fn connect(connection_string: &str) -> Result<Self, AppError> {
        if let Some(parent) = file_parent_dir(connection_string) {
            std::fs::create_dir_all(parent).map_err(|e| AppError::Database(sqlx::Error::Io(e)))?;
        }

        let pool = SqlitePool::connect(connection_string).await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| {
                tracing::error!("Migration failed: {}", e);
                AppError::Internal(anyhow::anyhow!("Migration failed: {}", e))
            })?;

        tracing::info!("Database connected and migrated successfully");

        Ok(Self { pool })
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Get a user by email
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Create a user on first sign-in
    ///
    /// # Returns
    /// The stored user
    pub async fn create_user(&self, new_user: &NewUser) -> Result<User, AppError> {
        let now = Utc::now();
        let user = User {
            id: EntityId::new().0,
            name: new_user.name.clone(),
            email: new_user.email.clone(),
            image: new_user.image.clone(),
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, image, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.image)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(user)
    }

    // =========================================================================
    // Linked accounts
    // =========================================================================

    /// Link a provider account to a user. Relinking an existing provider
    /// subject moves it to the given user.
    pub async fn link_account(
        &self,
        provider: &str,
        provider_account_id: &str,
        user_id: &str,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO accounts (provider, provider_account_id, user_id, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(provider, provider_account_id) DO UPDATE SET
                user_id = excluded.user_id
            "#,
        )
        .bind(provider)
        .bind(provider_account_id)
        .bind(user_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get the user linked to a provider account
    pub async fn get_user_by_account(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT users.* FROM users
            JOIN accounts ON accounts.user_id = users.id
            WHERE accounts.provider = ? AND accounts.provider_account_id = ?
            "#,
        )
        .bind(provider)
        .bind(provider_account_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }
}

#[async_trait]
impl UserStore for Database {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        self.get_user_by_email(email).await
    }
}

/// Directory that must exist for a file-backed SQLite URL
fn file_parent_dir(connection_string: &str) -> Option<&std::path::Path> {
    let path = connection_string
        .strip_prefix("sqlite://")
        .or_else(|| connection_string.strip_prefix("sqlite:"))?;
    let path = path.split('?').next()?;
    if path.is_empty() || path.starts_with(':') {
        return None;
    }
    std::path::Path::new(path)
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
}
