pub mod models;

use chrono::Utc;
use sqlx::{Pool, Sqlite};
use uuid::Uuid;

use crate::errors::AppError;
use crate::storage::{self, Bucket, ObjectStore};
use models::{NewSpotlight, Spotlight};

/// Short promotional videos shown on the home feed.
pub struct SpotlightManager {
    pool: Pool<Sqlite>,
}

impl SpotlightManager {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    pub async fn create_spotlight(
        &self,
        store: &dyn ObjectStore,
        user_id: &str,
        spotlight: NewSpotlight,
    ) -> Result<Spotlight, AppError> {
        let title = spotlight.title.trim().to_string();
        let author = spotlight.author.trim().to_string();
        if title.is_empty() {
            return Err(AppError::Validation("Title is required".to_string()));
        }
        if author.is_empty() {
            return Err(AppError::Validation("Author is required".to_string()));
        }
        let video = spotlight
            .video
            .as_ref()
            .ok_or_else(|| AppError::Validation("Video file is required".to_string()))?;
        storage::validate_upload("video", &video.bytes)?;

        let video_path =
            storage::upload(store, Bucket::Spotlight, "spotlight", &title, &video.bytes).await?;

        let id = Uuid::new_v4().to_string();
        let inserted = sqlx::query(
            r#"
            INSERT INTO spotlights (id, user_id, title, author, genre, description, video_path, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(user_id)
        .bind(&title)
        .bind(&author)
        .bind(&spotlight.genre)
        .bind(&spotlight.description)
        .bind(&video_path)
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await;

        if let Err(e) = inserted {
            storage::remove_quietly(store, Bucket::Spotlight, &video_path).await;
            return Err(e.into());
        }

        let created = sqlx::query_as::<_, Spotlight>("SELECT * FROM spotlights WHERE id = ?")
            .bind(&id)
            .fetch_one(&self.pool)
            .await?;
        log::info!("Created spotlight {} '{}' for user {}", id, title, user_id);
        Ok(created)
    }

    pub async fn list_spotlights(&self) -> Vec<Spotlight> {
        sqlx::query_as::<_, Spotlight>("SELECT * FROM spotlights ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await
            .unwrap_or_else(|e| {
                log::error!("Failed to load spotlights: {}", e);
                Vec::new()
            })
    }

    pub async fn delete_spotlight(
        &self,
        store: &dyn ObjectStore,
        user_id: &str,
        id: &str,
    ) -> Result<(), AppError> {
        let existing = sqlx::query_as::<_, Spotlight>(
            "SELECT * FROM spotlights WHERE id = ? AND user_id = ?",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(spotlight) = existing else {
            return Err(AppError::Integrity(format!(
                "Spotlight {} was not deleted; it does not exist or is not owned by the caller",
                id
            )));
        };

        sqlx::query("DELETE FROM spotlights WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        storage::remove_quietly(store, Bucket::Spotlight, &spotlight.video_path).await;
        Ok(())
    }
}
