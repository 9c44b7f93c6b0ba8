use serde::{Deserialize, Serialize};

use crate::library::models::MediaFile;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Spotlight {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub author: String,
    pub genre: Option<String>,
    pub description: Option<String>,
    pub video_path: String,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct NewSpotlight {
    pub title: String,
    pub author: String,
    pub genre: Option<String>,
    pub description: Option<String>,
    pub video: Option<MediaFile>,
}
