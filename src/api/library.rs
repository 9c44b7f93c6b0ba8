use axum::extract::{Multipart, Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;

use super::auth::CurrentUser;
use super::AppState;
use crate::billing::models::{ProductWithPrices, Subscription};
use crate::errors::AppError;
use crate::favorites::models::LikedSong;
use crate::library::models::{AnySong, MediaFile, NewSong, Song, SongRef, SongUpdate};
use crate::playlist::models::{Playlist, PlaylistDetails, PlaylistSong};
use crate::spotlight::models::{NewSpotlight, Spotlight};

/// Text fields and files from a multipart upload.
#[derive(Default)]
struct UploadForm {
    text: HashMap<String, String>,
    files: HashMap<String, MediaFile>,
}

impl UploadForm {
    async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = UploadForm::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::Validation(format!("Malformed upload: {}", e)))?
        {
            let name = field.name().unwrap_or_default().to_string();
            let file_name = field.file_name().map(str::to_string);
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::Validation(format!("Malformed upload field {}: {}", name, e)))?;

            match file_name {
                Some(file_name) => {
                    form.files.insert(
                        name,
                        MediaFile {
                            file_name,
                            bytes: bytes.to_vec(),
                        },
                    );
                }
                None => {
                    let value = String::from_utf8(bytes.to_vec()).map_err(|_| {
                        AppError::Validation(format!("Field {} is not valid UTF-8", name))
                    })?;
                    form.text.insert(name, value);
                }
            }
        }
        Ok(form)
    }

    fn text(&mut self, name: &str) -> Option<String> {
        self.text.remove(name).filter(|v| !v.trim().is_empty())
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    pub genre: Option<String>,
}

pub async fn search_songs(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Json<Vec<Song>> {
    let songs = match query.genre.as_deref() {
        Some(genre) => state.library.get_songs_by_genre(genre).await,
        None => state.library.search_songs(&query.q).await,
    };
    Json(songs)
}

/// Both kinds of song owned by the caller, newest first.
pub async fn my_songs(State(state): State<AppState>, user: CurrentUser) -> Json<Vec<AnySong>> {
    let (regular, generated) = tokio::join!(
        state.library.get_songs_by_user(&user.id),
        state.library.get_suno_songs_by_user(&user.id)
    );
    let mut songs: Vec<AnySong> = regular
        .into_iter()
        .map(AnySong::Regular)
        .chain(generated.into_iter().map(AnySong::Generated))
        .collect();
    songs.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
    Json(songs)
}

pub async fn upload_song(
    State(state): State<AppState>,
    user: CurrentUser,
    multipart: Multipart,
) -> Result<Json<Song>, AppError> {
    let mut form = UploadForm::read(multipart).await?;
    let new_song = NewSong {
        title: form.text("title").unwrap_or_default(),
        author: form.text("author").unwrap_or_default(),
        genre: form.text("genre"),
        lyrics: form.text("lyrics"),
        song: form.files.remove("song"),
        image: form.files.remove("image"),
        video: form.files.remove("video"),
    };
    let song = state
        .library
        .upload_song(state.store.as_ref(), &user.id, new_song)
        .await?;
    Ok(Json(song))
}

pub async fn delete_song(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    state
        .library
        .delete_song(state.store.as_ref(), &user.id, &id)
        .await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn update_song(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(update): Json<SongUpdate>,
) -> Result<Json<Song>, AppError> {
    Ok(Json(state.library.update_song(&user.id, &id, update).await?))
}

pub async fn delete_suno_song(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    state.library.delete_suno_song(&user.id, &id).await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn liked_songs(State(state): State<AppState>, user: CurrentUser) -> Json<Vec<LikedSong>> {
    Json(state.favorites.get_liked_songs(&user.id).await)
}

pub async fn like(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(song): Json<SongRef>,
) -> Result<Json<Value>, AppError> {
    let added = state.favorites.like(&user.id, &song).await?;
    Ok(Json(json!({ "liked": true, "changed": added })))
}

pub async fn unlike(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(song): Json<SongRef>,
) -> Result<Json<Value>, AppError> {
    let removed = state.favorites.unlike(&user.id, &song).await?;
    Ok(Json(json!({ "liked": false, "changed": removed })))
}

#[derive(Debug, Deserialize)]
pub struct PlaylistBody {
    pub name: Option<String>,
    pub description: Option<String>,
}

pub async fn my_playlists(State(state): State<AppState>, user: CurrentUser) -> Json<Vec<Playlist>> {
    Json(state.playlists.list_playlists(&user.id).await)
}

pub async fn create_playlist(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(body): Json<PlaylistBody>,
) -> Result<Json<Playlist>, AppError> {
    let playlist = state
        .playlists
        .create_playlist(&user.id, body.name.as_deref().unwrap_or_default(), body.description)
        .await?;
    Ok(Json(playlist))
}

pub async fn playlist_details(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<PlaylistDetails>, AppError> {
    Ok(Json(state.playlists.get_playlist_details(&user.id, &id).await?))
}

pub async fn update_playlist(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(body): Json<PlaylistBody>,
) -> Result<Json<Playlist>, AppError> {
    let playlist = state
        .playlists
        .update_playlist(&user.id, &id, body.name, body.description)
        .await?;
    Ok(Json(playlist))
}

pub async fn delete_playlist(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    state.playlists.delete_playlist(&user.id, &id).await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn add_to_playlist(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(song): Json<SongRef>,
) -> Result<Json<PlaylistSong>, AppError> {
    Ok(Json(state.playlists.add_song(&user.id, &id, &song).await?))
}

pub async fn remove_from_playlist(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((id, entry_id)): Path<(String, String)>,
) -> Result<Json<Value>, AppError> {
    state.playlists.remove_song(&user.id, &id, &entry_id).await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn list_spotlights(State(state): State<AppState>) -> Json<Vec<Spotlight>> {
    Json(state.spotlights.list_spotlights().await)
}

pub async fn create_spotlight(
    State(state): State<AppState>,
    user: CurrentUser,
    multipart: Multipart,
) -> Result<Json<Spotlight>, AppError> {
    let mut form = UploadForm::read(multipart).await?;
    let spotlight = NewSpotlight {
        title: form.text("title").unwrap_or_default(),
        author: form.text("author").unwrap_or_default(),
        genre: form.text("genre"),
        description: form.text("description"),
        video: form.files.remove("video"),
    };
    let created = state
        .spotlights
        .create_spotlight(state.store.as_ref(), &user.id, spotlight)
        .await?;
    Ok(Json(created))
}

pub async fn delete_spotlight(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    state
        .spotlights
        .delete_spotlight(state.store.as_ref(), &user.id, &id)
        .await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn products(State(state): State<AppState>) -> Json<Vec<ProductWithPrices>> {
    Json(state.billing.get_active_products_with_prices().await)
}

pub async fn subscription(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Json<Option<Subscription>> {
    Json(state.billing.get_active_subscription(&user.id).await)
}
