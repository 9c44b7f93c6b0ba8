pub mod generated;
pub mod models;

use chrono::Utc;
use sqlx::{Pool, Sqlite};
use uuid::Uuid;

use crate::errors::AppError;
use crate::storage::{self, Bucket, ObjectStore};
use models::{MediaFile, NewSong, Song, SongRef, SongUpdate};

pub struct LibraryManager {
    pool: Pool<Sqlite>,
}

impl LibraryManager {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn get_songs(&self) -> Vec<Song> {
        sqlx::query_as::<_, Song>("SELECT * FROM songs ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await
            .unwrap_or_else(|e| {
                log::error!("Failed to load songs: {}", e);
                Vec::new()
            })
    }

    pub async fn get_songs_by_user(&self, user_id: &str) -> Vec<Song> {
        sqlx::query_as::<_, Song>(
            "SELECT * FROM songs WHERE user_id = ? ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .unwrap_or_else(|e| {
            log::error!("Failed to load songs for user {}: {}", user_id, e);
            Vec::new()
        })
    }

    /// Case-insensitive title search; an empty query lists everything.
    pub async fn search_songs(&self, query: &str) -> Vec<Song> {
        let query = query.trim();
        if query.is_empty() {
            return self.get_songs().await;
        }

        sqlx::query_as::<_, Song>(
            "SELECT * FROM songs WHERE title LIKE ? COLLATE NOCASE ORDER BY created_at DESC",
        )
        .bind(format!("%{}%", query))
        .fetch_all(&self.pool)
        .await
        .unwrap_or_else(|e| {
            log::error!("Song search for '{}' failed: {}", query, e);
            Vec::new()
        })
    }

    pub async fn get_songs_by_genre(&self, genre: &str) -> Vec<Song> {
        sqlx::query_as::<_, Song>(
            "SELECT * FROM songs WHERE genre = ? COLLATE NOCASE ORDER BY play_count DESC, created_at DESC",
        )
        .bind(genre)
        .fetch_all(&self.pool)
        .await
        .unwrap_or_else(|e| {
            log::error!("Failed to load songs for genre {}: {}", genre, e);
            Vec::new()
        })
    }

    pub async fn get_song(&self, id: &str) -> Option<Song> {
        sqlx::query_as::<_, Song>("SELECT * FROM songs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                log::error!("Failed to load song {}: {}", id, e);
                None
            })
    }

    /// Uploads media then inserts the song row. Missing fields and oversized
    /// files are rejected before any storage call; uploaded objects are
    /// removed again if a later step fails.
    pub async fn upload_song(
        &self,
        store: &dyn ObjectStore,
        user_id: &str,
        new_song: NewSong,
    ) -> Result<Song, AppError> {
        let (song_file, image_file) = validate_new_song(&new_song)?;

        let title = new_song.title.trim().to_string();
        let author = new_song.author.trim().to_string();

        let mut uploaded: Vec<(Bucket, String)> = Vec::new();
        let result: Result<Song, AppError> = async {
            let song_path =
                storage::upload(store, Bucket::Songs, "song", &title, &song_file.bytes).await?;
            uploaded.push((Bucket::Songs, song_path.clone()));

            let image_path =
                storage::upload(store, Bucket::Images, "image", &title, &image_file.bytes).await?;
            uploaded.push((Bucket::Images, image_path.clone()));

            let video_path = match &new_song.video {
                Some(video) => {
                    let key =
                        storage::upload(store, Bucket::Videos, "video", &title, &video.bytes).await?;
                    uploaded.push((Bucket::Videos, key.clone()));
                    Some(key)
                }
                None => None,
            };

            let id = Uuid::new_v4().to_string();
            sqlx::query(
                r#"
                INSERT INTO songs (id, user_id, title, author, song_path, image_path, video_path, genre, lyrics, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&id)
            .bind(user_id)
            .bind(&title)
            .bind(&author)
            .bind(&song_path)
            .bind(&image_path)
            .bind(&video_path)
            .bind(&new_song.genre)
            .bind(&new_song.lyrics)
            .bind(Utc::now().timestamp_millis())
            .execute(&self.pool)
            .await?;

            self.get_song(&id)
                .await
                .ok_or_else(|| AppError::Database(format!("Inserted song {} not readable", id)))
        }
        .await;

        match result {
            Ok(song) => {
                log::info!("Uploaded song {} '{}' for user {}", song.id, song.title, user_id);
                Ok(song)
            }
            Err(e) => {
                for (bucket, key) in &uploaded {
                    storage::remove_quietly(store, *bucket, key).await;
                }
                Err(e)
            }
        }
    }

    pub async fn update_song(
        &self,
        user_id: &str,
        song_id: &str,
        update: SongUpdate,
    ) -> Result<Song, AppError> {
        if let Some(title) = &update.title {
            if title.trim().is_empty() {
                return Err(AppError::Validation("Title cannot be empty".to_string()));
            }
        }

        let result = sqlx::query(
            r#"
            UPDATE songs SET
                title = COALESCE(?, title),
                author = COALESCE(?, author),
                genre = COALESCE(?, genre),
                lyrics = COALESCE(?, lyrics)
            WHERE id = ? AND user_id = ?
            "#,
        )
        .bind(update.title.as_deref().map(str::trim))
        .bind(update.author.as_deref().map(str::trim))
        .bind(&update.genre)
        .bind(&update.lyrics)
        .bind(song_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Integrity(format!(
                "Song {} was not updated; it does not exist or is not owned by the caller",
                song_id
            )));
        }

        self.get_song(song_id)
            .await
            .ok_or_else(|| AppError::NotFound(format!("Song {}", song_id)))
    }

    /// Deletes the row first, then its storage objects.
    pub async fn delete_song(
        &self,
        store: &dyn ObjectStore,
        user_id: &str,
        song_id: &str,
    ) -> Result<(), AppError> {
        let song = sqlx::query_as::<_, Song>("SELECT * FROM songs WHERE id = ? AND user_id = ?")
            .bind(song_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        let result = sqlx::query("DELETE FROM songs WHERE id = ? AND user_id = ?")
            .bind(song_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        let song = match (song, result.rows_affected()) {
            (Some(song), n) if n > 0 => song,
            _ => {
                return Err(AppError::Integrity(format!(
                    "Song {} was not deleted; it does not exist or is not owned by the caller",
                    song_id
                )))
            }
        };

        storage::remove_quietly(store, Bucket::Songs, &song.song_path).await;
        storage::remove_quietly(store, Bucket::Images, &song.image_path).await;
        if let Some(video) = &song.video_path {
            storage::remove_quietly(store, Bucket::Videos, video).await;
        }

        log::info!("Deleted song {} for user {}", song_id, user_id);
        Ok(())
    }

    /// Atomic in-database increment, safe under concurrent plays.
    pub async fn increment_play_count(&self, song: &SongRef) -> Result<(), AppError> {
        let sql = match song {
            SongRef::Regular(_) => "UPDATE songs SET play_count = play_count + 1 WHERE id = ?",
            SongRef::Suno(_) => "UPDATE suno_songs SET play_count = play_count + 1 WHERE id = ?",
        };
        let result = sqlx::query(sql).bind(song.id()).execute(&self.pool).await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "{} song {}",
                song.song_type(),
                song.id()
            )));
        }
        Ok(())
    }
}

fn validate_new_song(new_song: &NewSong) -> Result<(&MediaFile, &MediaFile), AppError> {
    if new_song.title.trim().is_empty() {
        return Err(AppError::Validation("Title is required".to_string()));
    }
    if new_song.author.trim().is_empty() {
        return Err(AppError::Validation("Author is required".to_string()));
    }
    let song = new_song
        .song
        .as_ref()
        .ok_or_else(|| AppError::Validation("Song file is required".to_string()))?;
    let image = new_song
        .image
        .as_ref()
        .ok_or_else(|| AppError::Validation("Image file is required".to_string()))?;

    storage::validate_upload("song", &song.bytes)?;
    storage::validate_upload("image", &image.bytes)?;
    if let Some(video) = &new_song.video {
        storage::validate_upload("video", &video.bytes)?;
    }
    Ok((song, image))
}
