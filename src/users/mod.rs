use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};
use std::sync::Arc;

use crate::crypto::CredentialCipher;
use crate::errors::AppError;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    #[serde(skip_serializing)]
    pub suno_cookie: Option<String>,
    pub created_at: i64,
}

/// Profile rows and the per-user encrypted Suno cookie.
pub struct UserManager {
    pool: Pool<Sqlite>,
}

impl UserManager {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Creates the profile row on first sight of an authenticated id.
    pub async fn ensure_user(&self, user_id: &str) -> Result<User, AppError> {
        sqlx::query("INSERT OR IGNORE INTO users (id, created_at) VALUES (?, ?)")
            .bind(user_id)
            .bind(Utc::now().timestamp_millis())
            .execute(&self.pool)
            .await?;

        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn get_user(&self, user_id: &str) -> Option<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                log::error!("Failed to load user {}: {}", user_id, e);
                None
            })
    }

    pub async fn set_suno_cookie(
        &self,
        user_id: &str,
        cookie: &str,
        cipher: &Arc<CredentialCipher>,
    ) -> Result<(), AppError> {
        let cookie = cookie.trim();
        if cookie.is_empty() {
            return Err(AppError::Validation("Cookie is required".to_string()));
        }

        let encrypted = cipher.encrypt_blocking(cookie).await?;
        self.ensure_user(user_id).await?;
        sqlx::query("UPDATE users SET suno_cookie = ? WHERE id = ?")
            .bind(&encrypted)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        log::info!("Stored Suno cookie for user {}", user_id);
        Ok(())
    }

    async fn encrypted_cookie(&self, user_id: &str) -> Result<Option<String>, AppError> {
        let row: Option<(Option<String>,)> =
            sqlx::query_as("SELECT suno_cookie FROM users WHERE id = ?")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.and_then(|(cookie,)| cookie).filter(|c| !c.is_empty()))
    }

    /// Decrypted cookie. A stored value that cannot be decrypted is an
    /// error, never treated as absent.
    pub async fn suno_cookie(
        &self,
        user_id: &str,
        cipher: &Arc<CredentialCipher>,
    ) -> Result<String, AppError> {
        let encrypted = self
            .encrypted_cookie(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("No Suno cookie stored".to_string()))?;

        cipher.decrypt_blocking(&encrypted).await.map_err(|e| {
            log::error!("Stored Suno cookie for user {} is unreadable: {}", user_id, e);
            AppError::from(e)
        })
    }

    pub async fn has_suno_cookie(&self, user_id: &str) -> Result<bool, AppError> {
        Ok(self.encrypted_cookie(user_id).await?.is_some())
    }

    pub async fn clear_suno_cookie(&self, user_id: &str) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE users SET suno_cookie = NULL WHERE id = ? AND suno_cookie IS NOT NULL",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
