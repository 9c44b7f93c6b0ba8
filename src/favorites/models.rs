use serde::{Deserialize, Serialize};

use crate::library::models::AnySong;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LikedSong {
    pub liked_at: i64,
    pub song: AnySong,
}
