pub mod models;

use chrono::Utc;
use sqlx::{Pool, Sqlite};

use crate::errors::AppError;
use crate::library::models::{AnySong, Song, SongRef, SunoSong};
use models::LikedSong;

pub struct FavoritesManager {
    pool: Pool<Sqlite>,
}

#[derive(sqlx::FromRow)]
struct LikedRegularRow {
    liked_at: i64,
    #[sqlx(flatten)]
    song: Song,
}

#[derive(sqlx::FromRow)]
struct LikedSunoRow {
    liked_at: i64,
    #[sqlx(flatten)]
    song: SunoSong,
}

struct LikeTables {
    likes: &'static str,
    key: &'static str,
    songs: &'static str,
}

fn tables(song: &SongRef) -> LikeTables {
    match song {
        SongRef::Regular(_) => LikeTables {
            likes: "liked_songs_regular",
            key: "song_id",
            songs: "songs",
        },
        SongRef::Suno(_) => LikeTables {
            likes: "liked_songs_suno",
            key: "suno_song_id",
            songs: "suno_songs",
        },
    }
}

impl FavoritesManager {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Records a like and bumps `like_count` in one transaction. Liking twice
    /// is a no-op. Returns whether a new like was recorded.
    pub async fn like(&self, user_id: &str, song: &SongRef) -> Result<bool, AppError> {
        let t = tables(song);
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(&format!(
            "INSERT OR IGNORE INTO {} (user_id, {}, created_at) VALUES (?, ?, ?)",
            t.likes, t.key
        ))
        .bind(user_id)
        .bind(song.id())
        .bind(Utc::now().timestamp_millis())
        .execute(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.message().contains("FOREIGN KEY") => {
                AppError::NotFound(format!("{} song {}", song.song_type(), song.id()))
            }
            other => other.into(),
        })?
        .rows_affected()
            > 0;

        if inserted {
            sqlx::query(&format!(
                "UPDATE {} SET like_count = like_count + 1 WHERE id = ?",
                t.songs
            ))
            .bind(song.id())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(inserted)
    }

    /// Removes a like; `like_count` never drops below zero.
    pub async fn unlike(&self, user_id: &str, song: &SongRef) -> Result<bool, AppError> {
        let t = tables(song);
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query(&format!(
            "DELETE FROM {} WHERE user_id = ? AND {} = ?",
            t.likes, t.key
        ))
        .bind(user_id)
        .bind(song.id())
        .execute(&mut *tx)
        .await?
        .rows_affected()
            > 0;

        if removed {
            sqlx::query(&format!(
                "UPDATE {} SET like_count = MAX(like_count - 1, 0) WHERE id = ?",
                t.songs
            ))
            .bind(song.id())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(removed)
    }

    pub async fn is_liked(&self, user_id: &str, song: &SongRef) -> Result<bool, AppError> {
        let t = tables(song);
        let row = sqlx::query(&format!(
            "SELECT 1 FROM {} WHERE user_id = ? AND {} = ?",
            t.likes, t.key
        ))
        .bind(user_id)
        .bind(song.id())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.is_some())
    }

    /// Liked songs of both kinds, most recently liked first. The two kinds
    /// are fetched concurrently.
    pub async fn get_liked_songs(&self, user_id: &str) -> Vec<LikedSong> {
        let regular = sqlx::query_as::<_, LikedRegularRow>(
            r#"
            SELECT l.created_at AS liked_at, s.*
            FROM liked_songs_regular l
            JOIN songs s ON s.id = l.song_id
            WHERE l.user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool);

        let suno = sqlx::query_as::<_, LikedSunoRow>(
            r#"
            SELECT l.created_at AS liked_at, g.*
            FROM liked_songs_suno l
            JOIN suno_songs g ON g.id = l.suno_song_id
            WHERE l.user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool);

        let (regular, suno) = tokio::join!(regular, suno);
        let regular = regular.unwrap_or_else(|e| {
            log::error!("Failed to load liked songs for {}: {}", user_id, e);
            Vec::new()
        });
        let suno = suno.unwrap_or_else(|e| {
            log::error!("Failed to load liked suno songs for {}: {}", user_id, e);
            Vec::new()
        });

        let mut liked: Vec<LikedSong> = regular
            .into_iter()
            .map(|row| LikedSong {
                liked_at: row.liked_at,
                song: AnySong::Regular(row.song),
            })
            .chain(suno.into_iter().map(|row| LikedSong {
                liked_at: row.liked_at,
                song: AnySong::Generated(row.song),
            }))
            .collect();

        liked.sort_by(|a, b| b.liked_at.cmp(&a.liked_at));
        liked
    }
}
