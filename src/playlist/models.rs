use serde::{Deserialize, Serialize};

use crate::library::models::{AnySong, SongRef, SongType};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Playlist {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub description: Option<String>,
    pub image_path: Option<String>,
    pub created_at: i64,
}

/// Raw `playlist_songs` row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PlaylistSongRow {
    pub id: String,
    pub playlist_id: String,
    pub song_type: String,
    pub song_id: Option<String>,
    pub suno_song_id: Option<String>,
    pub created_at: i64,
}

/// Join record pointing at exactly one song of either kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistSong {
    pub id: String,
    pub playlist_id: String,
    pub song: SongRef,
    pub created_at: i64,
}

impl PlaylistSong {
    pub fn song_type(&self) -> SongType {
        self.song.song_type()
    }
}

impl TryFrom<PlaylistSongRow> for PlaylistSong {
    type Error = String;

    fn try_from(row: PlaylistSongRow) -> Result<Self, Self::Error> {
        let song = SongRef::from_columns(&row.song_type, row.song_id, row.suno_song_id)
            .map_err(|e| format!("playlist entry {}: {}", row.id, e))?;
        Ok(Self {
            id: row.id,
            playlist_id: row.playlist_id,
            song,
            created_at: row.created_at,
        })
    }
}

/// Playlist entry resolved to its song.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistEntry {
    pub entry_id: String,
    pub added_at: i64,
    pub song: AnySong,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistDetails {
    pub playlist: Playlist,
    pub entries: Vec<PlaylistEntry>,
}
