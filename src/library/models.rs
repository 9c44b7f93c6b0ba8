use serde::{Deserialize, Serialize};

use crate::suno::ClipStatus;

/// Discriminator stored in `playlist_songs.song_type`.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SongType {
    Regular,
    Suno,
}

impl SongType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SongType::Regular => "regular",
            SongType::Suno => "suno",
        }
    }
}

impl TryFrom<&str> for SongType {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "regular" => Ok(SongType::Regular),
            "suno" => Ok(SongType::Suno),
            other => Err(format!("unknown song_type '{}'", other)),
        }
    }
}

impl std::fmt::Display for SongType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to exactly one song of either kind.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Hash)]
#[serde(tag = "song_type", content = "id", rename_all = "lowercase")]
pub enum SongRef {
    Regular(String),
    Suno(String),
}

impl SongRef {
    pub fn song_type(&self) -> SongType {
        match self {
            SongRef::Regular(_) => SongType::Regular,
            SongRef::Suno(_) => SongType::Suno,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            SongRef::Regular(id) | SongRef::Suno(id) => id,
        }
    }

    /// `(song_id, suno_song_id)` columns; exactly one is set.
    pub fn foreign_keys(&self) -> (Option<&str>, Option<&str>) {
        match self {
            SongRef::Regular(id) => (Some(id.as_str()), None),
            SongRef::Suno(id) => (None, Some(id.as_str())),
        }
    }

    /// Rebuilds a reference from stored columns, rejecting rows where the
    /// populated key does not match the discriminator.
    pub fn from_columns(
        song_type: &str,
        song_id: Option<String>,
        suno_song_id: Option<String>,
    ) -> Result<Self, String> {
        match (SongType::try_from(song_type)?, song_id, suno_song_id) {
            (SongType::Regular, Some(id), None) => Ok(SongRef::Regular(id)),
            (SongType::Suno, None, Some(id)) => Ok(SongRef::Suno(id)),
            (t, s, g) => Err(format!(
                "song_type '{}' does not match keys (song_id={:?}, suno_song_id={:?})",
                t, s, g
            )),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, sqlx::FromRow)]
pub struct Song {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub author: String,
    pub song_path: String,
    pub image_path: String,
    pub video_path: Option<String>,
    pub genre: Option<String>,
    pub lyrics: Option<String>,
    pub play_count: i64,
    pub like_count: i64,
    pub created_at: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, sqlx::FromRow)]
pub struct SunoSong {
    pub id: String,
    pub suno_id: String,
    pub user_id: String,
    pub title: String,
    pub audio_url: Option<String>,
    pub video_url: Option<String>,
    pub image_url: Option<String>,
    pub lyric: Option<String>,
    pub prompt: Option<String>,
    pub gpt_description_prompt: Option<String>,
    pub tags: Option<String>,
    pub model_name: String,
    pub status: String,
    pub duration: Option<f64>,
    pub error_message: Option<String>,
    pub play_count: i64,
    pub like_count: i64,
    pub created_at: i64,
}

impl SunoSong {
    pub fn clip_status(&self) -> ClipStatus {
        ClipStatus::from(self.status.clone())
    }
}

/// A song of either kind.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "song_type", rename_all = "lowercase")]
pub enum AnySong {
    Regular(Song),
    #[serde(rename = "suno")]
    Generated(SunoSong),
}

impl AnySong {
    pub fn song_ref(&self) -> SongRef {
        match self {
            AnySong::Regular(s) => SongRef::Regular(s.id.clone()),
            AnySong::Generated(s) => SongRef::Suno(s.id.clone()),
        }
    }

    pub fn title(&self) -> &str {
        match self {
            AnySong::Regular(s) => &s.title,
            AnySong::Generated(s) => &s.title,
        }
    }

    pub fn created_at(&self) -> i64 {
        match self {
            AnySong::Regular(s) => s.created_at,
            AnySong::Generated(s) => s.created_at,
        }
    }
}

/// Uploaded file contents with the client-supplied name.
#[derive(Debug, Clone)]
pub struct MediaFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct NewSong {
    pub title: String,
    pub author: String,
    pub genre: Option<String>,
    pub lyrics: Option<String>,
    pub song: Option<MediaFile>,
    pub image: Option<MediaFile>,
    pub video: Option<MediaFile>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SongUpdate {
    pub title: Option<String>,
    pub author: Option<String>,
    pub genre: Option<String>,
    pub lyrics: Option<String>,
}
