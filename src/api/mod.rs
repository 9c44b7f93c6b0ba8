//! HTTP surface. Handlers stay thin and delegate to the managers.

pub mod auth;
pub mod library;
pub mod player;
pub mod suno;
pub mod webhooks;

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use sqlx::{Pool, Sqlite};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::billing::BillingManager;
use crate::crypto::CredentialCipher;
use crate::errors::AppError;
use crate::favorites::FavoritesManager;
use crate::library::LibraryManager;
use crate::player::PlayerSessions;
use crate::playlist::PlaylistManager;
use crate::spotlight::SpotlightManager;
use crate::storage::{ObjectStore, MAX_UPLOAD_BYTES};
use crate::suno::SunoSessions;
use crate::users::UserManager;

pub use auth::{CurrentUser, USER_ID_HEADER};

// Song uploads carry up to three files.
const MAX_BODY_BYTES: usize = 3 * MAX_UPLOAD_BYTES + 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub library: Arc<LibraryManager>,
    pub favorites: Arc<FavoritesManager>,
    pub playlists: Arc<PlaylistManager>,
    pub spotlights: Arc<SpotlightManager>,
    pub users: Arc<UserManager>,
    pub billing: Arc<BillingManager>,
    pub players: Arc<PlayerSessions>,
    pub store: Arc<dyn ObjectStore>,
    pub sessions: Arc<SunoSessions>,
    pub cipher: Option<Arc<CredentialCipher>>,
    pub webhook_secret: Option<String>,
}

impl AppState {
    pub fn new(
        pool: Pool<Sqlite>,
        store: Arc<dyn ObjectStore>,
        sessions: SunoSessions,
        cipher: Option<CredentialCipher>,
        webhook_secret: Option<String>,
    ) -> Self {
        let library = Arc::new(LibraryManager::new(pool.clone()));
        Self {
            players: Arc::new(PlayerSessions::new(library.clone())),
            library,
            favorites: Arc::new(FavoritesManager::new(pool.clone())),
            playlists: Arc::new(PlaylistManager::new(pool.clone())),
            spotlights: Arc::new(SpotlightManager::new(pool.clone())),
            users: Arc::new(UserManager::new(pool.clone())),
            billing: Arc::new(BillingManager::new(pool)),
            store,
            sessions: Arc::new(sessions),
            cipher: cipher.map(Arc::new),
            webhook_secret,
        }
    }

    pub fn cipher(&self) -> Result<&Arc<CredentialCipher>, AppError> {
        self.cipher
            .as_ref()
            .ok_or_else(|| AppError::Config("ENCRYPTION_KEY is not configured".to_string()))
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub fn build_router(state: AppState) -> Router {
    // Generation is called from other origins.
    let generate = Router::new()
        .route("/api/suno/generate", post(suno::generate))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    Router::new()
        .route("/health", get(health))
        .route(
            "/api/suno/cookie",
            get(suno::get_cookie)
                .post(suno::set_cookie)
                .delete(suno::delete_cookie),
        )
        .route("/api/suno/check-cookie", get(suno::check_cookie))
        .route("/api/suno/credits", get(suno::credits))
        .route("/api/suno/feed", get(suno::feed))
        .route("/api/suno/clips/{id}", get(suno::clip))
        .route("/api/suno/extend", post(suno::extend))
        .route("/api/suno/lyrics", post(suno::lyrics))
        .route("/api/webhooks", post(webhooks::stripe_webhook))
        .route(
            "/api/songs",
            get(library::search_songs).post(library::upload_song),
        )
        .route("/api/songs/mine", get(library::my_songs))
        .route(
            "/api/songs/{id}",
            patch(library::update_song).delete(library::delete_song),
        )
        .route("/api/suno-songs/{id}", delete(library::delete_suno_song))
        .route("/api/plays", post(player::record_play))
        .route("/api/player", get(player::state).post(player::dispatch))
        .route(
            "/api/likes",
            get(library::liked_songs)
                .post(library::like)
                .delete(library::unlike),
        )
        .route(
            "/api/playlists",
            get(library::my_playlists).post(library::create_playlist),
        )
        .route(
            "/api/playlists/{id}",
            get(library::playlist_details)
                .patch(library::update_playlist)
                .delete(library::delete_playlist),
        )
        .route("/api/playlists/{id}/songs", post(library::add_to_playlist))
        .route(
            "/api/playlists/{id}/songs/{entry_id}",
            delete(library::remove_from_playlist),
        )
        .route(
            "/api/spotlights",
            get(library::list_spotlights).post(library::create_spotlight),
        )
        .route("/api/spotlights/{id}", delete(library::delete_spotlight))
        .route("/api/billing/products", get(library::products))
        .route("/api/billing/subscription", get(library::subscription))
        .merge(generate)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}
