use chrono::Utc;
use uuid::Uuid;

use super::models::SunoSong;
use super::LibraryManager;
use crate::errors::AppError;
use crate::suno::AudioInfo;

impl LibraryManager {
    pub async fn get_suno_songs_by_user(&self, user_id: &str) -> Vec<SunoSong> {
        sqlx::query_as::<_, SunoSong>(
            "SELECT * FROM suno_songs WHERE user_id = ? ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await
        .unwrap_or_else(|e| {
            log::error!("Failed to load suno songs for user {}: {}", user_id, e);
            Vec::new()
        })
    }

    pub async fn get_suno_song(&self, id: &str) -> Option<SunoSong> {
        sqlx::query_as::<_, SunoSong>("SELECT * FROM suno_songs WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .unwrap_or_else(|e| {
                log::error!("Failed to load suno song {}: {}", id, e);
                None
            })
    }

    pub async fn get_suno_song_by_clip(&self, suno_id: &str) -> Option<SunoSong> {
        sqlx::query_as::<_, SunoSong>("SELECT * FROM suno_songs WHERE suno_id = ?")
            .bind(suno_id)
            .fetch_optional(self.pool())
            .await
            .unwrap_or_else(|e| {
                log::error!("Failed to load suno clip {}: {}", suno_id, e);
                None
            })
    }

    /// Inserts new clips and refreshes known ones (status, media URLs, lyrics)
    /// keyed by the provider clip id. Counters are never touched here.
    pub async fn upsert_suno_clips(
        &self,
        user_id: &str,
        clips: &[AudioInfo],
    ) -> Result<Vec<SunoSong>, AppError> {
        let mut tx = self.pool().begin().await?;
        let now = Utc::now().timestamp_millis();

        for clip in clips {
            sqlx::query(
                r#"
                INSERT INTO suno_songs (
                    id, suno_id, user_id, title, audio_url, video_url, image_url,
                    lyric, prompt, gpt_description_prompt, tags, model_name,
                    status, duration, error_message, created_at
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(suno_id) DO UPDATE SET
                    title = excluded.title,
                    audio_url = COALESCE(excluded.audio_url, suno_songs.audio_url),
                    video_url = COALESCE(excluded.video_url, suno_songs.video_url),
                    image_url = COALESCE(excluded.image_url, suno_songs.image_url),
                    lyric = COALESCE(excluded.lyric, suno_songs.lyric),
                    tags = COALESCE(excluded.tags, suno_songs.tags),
                    status = excluded.status,
                    duration = COALESCE(excluded.duration, suno_songs.duration),
                    error_message = excluded.error_message
                WHERE suno_songs.user_id = excluded.user_id
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&clip.id)
            .bind(user_id)
            .bind(clip.title.as_deref().unwrap_or_default())
            .bind(&clip.audio_url)
            .bind(&clip.video_url)
            .bind(&clip.image_url)
            .bind(&clip.lyric)
            .bind(&clip.prompt)
            .bind(&clip.gpt_description_prompt)
            .bind(&clip.tags)
            .bind(clip.model_name.as_deref().unwrap_or_default())
            .bind(clip.status.as_str())
            .bind(clip.duration)
            .bind(&clip.error_message)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        let mut stored = Vec::with_capacity(clips.len());
        for clip in clips {
            if let Some(song) = self.get_suno_song_by_clip(&clip.id).await {
                if song.user_id == user_id {
                    stored.push(song);
                }
            }
        }

        log::info!("Stored {} suno clip(s) for user {}", stored.len(), user_id);
        Ok(stored)
    }

    pub async fn delete_suno_song(&self, user_id: &str, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM suno_songs WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Integrity(format!(
                "Suno song {} was not deleted; it does not exist or is not owned by the caller",
                id
            )));
        }
        Ok(())
    }
}
