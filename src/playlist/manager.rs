use chrono::Utc;
use sqlx::{Pool, Sqlite};
use uuid::Uuid;

use super::models::{Playlist, PlaylistDetails, PlaylistEntry, PlaylistSong, PlaylistSongRow};
use crate::errors::AppError;
use crate::library::models::{AnySong, Song, SongRef, SunoSong};

#[derive(sqlx::FromRow)]
struct RegularEntryRow {
    entry_id: String,
    added_at: i64,
    #[sqlx(flatten)]
    song: Song,
}

#[derive(sqlx::FromRow)]
struct SunoEntryRow {
    entry_id: String,
    added_at: i64,
    #[sqlx(flatten)]
    song: SunoSong,
}

/// Combines entries of both kinds, newest first. Ties fall back to the entry
/// id so the order does not depend on which query finished first.
pub fn merge_by_recency(
    regular: Vec<PlaylistEntry>,
    suno: Vec<PlaylistEntry>,
) -> Vec<PlaylistEntry> {
    let mut merged: Vec<PlaylistEntry> = regular.into_iter().chain(suno).collect();
    merged.sort_by(|a, b| {
        b.added_at
            .cmp(&a.added_at)
            .then_with(|| a.entry_id.cmp(&b.entry_id))
    });
    merged
}

pub struct PlaylistManager {
    pool: Pool<Sqlite>,
}

impl PlaylistManager {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    pub async fn create_playlist(
        &self,
        user_id: &str,
        name: &str,
        description: Option<String>,
    ) -> Result<Playlist, AppError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("Playlist name is required".to_string()));
        }

        let id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO playlists (id, user_id, name, description, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(user_id)
        .bind(name)
        .bind(&description)
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;

        // Fetch back to return
        let playlist = sqlx::query_as::<_, Playlist>("SELECT * FROM playlists WHERE id = ?")
            .bind(&id)
            .fetch_one(&self.pool)
            .await?;

        log::info!("Created playlist {} '{}' for user {}", id, name, user_id);
        Ok(playlist)
    }

    pub async fn list_playlists(&self, user_id: &str) -> Vec<Playlist> {
        sqlx::query_as::<_, Playlist>(
            "SELECT * FROM playlists WHERE user_id = ? ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .unwrap_or_else(|e| {
            log::error!("Failed to load playlists for {}: {}", user_id, e);
            Vec::new()
        })
    }

    async fn owned_playlist(&self, user_id: &str, playlist_id: &str) -> Result<Playlist, AppError> {
        sqlx::query_as::<_, Playlist>("SELECT * FROM playlists WHERE id = ? AND user_id = ?")
            .bind(playlist_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Playlist {}", playlist_id)))
    }

    pub async fn update_playlist(
        &self,
        user_id: &str,
        playlist_id: &str,
        name: Option<String>,
        description: Option<String>,
    ) -> Result<Playlist, AppError> {
        if name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(AppError::Validation("Playlist name cannot be empty".to_string()));
        }

        let result = sqlx::query(
            r#"
            UPDATE playlists SET
                name = COALESCE(?, name),
                description = COALESCE(?, description)
            WHERE id = ? AND user_id = ?
            "#,
        )
        .bind(name.as_deref().map(str::trim))
        .bind(&description)
        .bind(playlist_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Integrity(format!(
                "Playlist {} was not updated",
                playlist_id
            )));
        }
        self.owned_playlist(user_id, playlist_id).await
    }

    pub async fn delete_playlist(&self, user_id: &str, playlist_id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM playlists WHERE id = ? AND user_id = ?")
            .bind(playlist_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Integrity(format!(
                "Playlist {} was not deleted",
                playlist_id
            )));
        }
        Ok(())
    }

    /// Adds a song of either kind. The `song_type` column and the populated
    /// key both come from the same [`SongRef`], so they always agree.
    pub async fn add_song(
        &self,
        user_id: &str,
        playlist_id: &str,
        song: &SongRef,
    ) -> Result<PlaylistSong, AppError> {
        self.owned_playlist(user_id, playlist_id).await?;

        let (song_id, suno_song_id) = song.foreign_keys();
        let existing: Option<(String,)> = sqlx::query_as(
            r#"
            SELECT id FROM playlist_songs
            WHERE playlist_id = ? AND song_type = ?
              AND COALESCE(song_id, '') = COALESCE(?, '')
              AND COALESCE(suno_song_id, '') = COALESCE(?, '')
            "#,
        )
        .bind(playlist_id)
        .bind(song.song_type().as_str())
        .bind(song_id)
        .bind(suno_song_id)
        .fetch_optional(&self.pool)
        .await?;
        if existing.is_some() {
            return Err(AppError::Validation("Song is already in this playlist".to_string()));
        }

        let id = Uuid::new_v4().to_string();
        sqlx::query(
            r#"
            INSERT INTO playlist_songs (id, playlist_id, song_type, song_id, suno_song_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(playlist_id)
        .bind(song.song_type().as_str())
        .bind(song_id)
        .bind(suno_song_id)
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.message().contains("FOREIGN KEY") => {
                AppError::NotFound(format!("{} song {}", song.song_type(), song.id()))
            }
            other => other.into(),
        })?;

        let row = sqlx::query_as::<_, PlaylistSongRow>("SELECT * FROM playlist_songs WHERE id = ?")
            .bind(&id)
            .fetch_one(&self.pool)
            .await?;
        PlaylistSong::try_from(row).map_err(AppError::Integrity)
    }

    pub async fn remove_song(
        &self,
        user_id: &str,
        playlist_id: &str,
        entry_id: &str,
    ) -> Result<(), AppError> {
        self.owned_playlist(user_id, playlist_id).await?;

        let result = sqlx::query("DELETE FROM playlist_songs WHERE id = ? AND playlist_id = ?")
            .bind(entry_id)
            .bind(playlist_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Integrity(format!(
                "Playlist entry {} was not removed",
                entry_id
            )));
        }
        Ok(())
    }

    /// Raw join records; rows violating the type/key invariant are skipped
    /// and logged.
    pub async fn get_entries(&self, playlist_id: &str) -> Vec<PlaylistSong> {
        let rows = sqlx::query_as::<_, PlaylistSongRow>(
            "SELECT * FROM playlist_songs WHERE playlist_id = ? ORDER BY created_at DESC",
        )
        .bind(playlist_id)
        .fetch_all(&self.pool)
        .await
        .unwrap_or_else(|e| {
            log::error!("Failed to load entries for playlist {}: {}", playlist_id, e);
            Vec::new()
        });

        rows.into_iter()
            .filter_map(|row| match PlaylistSong::try_from(row) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    log::error!("Skipping invalid playlist entry: {}", e);
                    None
                }
            })
            .collect()
    }

    /// Songs of both kinds in a playlist, newest entry first. The two kinds
    /// are fetched concurrently.
    pub async fn get_playlist_songs(&self, playlist_id: &str) -> Vec<PlaylistEntry> {
        let regular = sqlx::query_as::<_, RegularEntryRow>(
            r#"
            SELECT ps.id AS entry_id, ps.created_at AS added_at, s.*
            FROM playlist_songs ps
            JOIN songs s ON s.id = ps.song_id
            WHERE ps.playlist_id = ? AND ps.song_type = 'regular'
            "#,
        )
        .bind(playlist_id)
        .fetch_all(&self.pool);

        let suno = sqlx::query_as::<_, SunoEntryRow>(
            r#"
            SELECT ps.id AS entry_id, ps.created_at AS added_at, g.*
            FROM playlist_songs ps
            JOIN suno_songs g ON g.id = ps.suno_song_id
            WHERE ps.playlist_id = ? AND ps.song_type = 'suno'
            "#,
        )
        .bind(playlist_id)
        .fetch_all(&self.pool);

        let (regular, suno) = tokio::join!(regular, suno);

        let regular: Vec<PlaylistEntry> = regular
            .unwrap_or_else(|e| {
                log::error!("Failed to load songs for playlist {}: {}", playlist_id, e);
                Vec::new()
            })
            .into_iter()
            .map(|row| PlaylistEntry {
                entry_id: row.entry_id,
                added_at: row.added_at,
                song: AnySong::Regular(row.song),
            })
            .collect();

        let suno: Vec<PlaylistEntry> = suno
            .unwrap_or_else(|e| {
                log::error!("Failed to load suno songs for playlist {}: {}", playlist_id, e);
                Vec::new()
            })
            .into_iter()
            .map(|row| PlaylistEntry {
                entry_id: row.entry_id,
                added_at: row.added_at,
                song: AnySong::Generated(row.song),
            })
            .collect();

        merge_by_recency(regular, suno)
    }

    /// A playlist with its songs. Only the owner can read it; anyone else
    /// gets NotFound.
    pub async fn get_playlist_details(
        &self,
        user_id: &str,
        playlist_id: &str,
    ) -> Result<PlaylistDetails, AppError> {
        let playlist = self.owned_playlist(user_id, playlist_id).await?;
        let entries = self.get_playlist_songs(playlist_id).await;
        Ok(PlaylistDetails { playlist, entries })
    }

    pub async fn get_playlists_containing(&self, song: &SongRef) -> Vec<String> {
        let (song_id, suno_song_id) = song.foreign_keys();
        sqlx::query_as::<_, (String,)>(
            r#"
            SELECT DISTINCT playlist_id FROM playlist_songs
            WHERE (song_id IS NOT NULL AND song_id = ?)
               OR (suno_song_id IS NOT NULL AND suno_song_id = ?)
            "#,
        )
        .bind(song_id)
        .bind(suno_song_id)
        .fetch_all(&self.pool)
        .await
        .map(|rows| rows.into_iter().map(|(id,)| id).collect())
        .unwrap_or_else(|e| {
            log::error!("Failed to look up playlists for {}: {}", song.id(), e);
            Vec::new()
        })
    }
}
