pub mod api;
pub mod billing;
pub mod config;
pub mod crypto;
pub mod database;
pub mod errors;
pub mod favorites;
pub mod library;
pub mod player;
pub mod playlist;
pub mod spotlight;
pub mod storage;
pub mod suno;
pub mod users;

use std::sync::Arc;

use api::AppState;
use config::AppConfig;
use crypto::CredentialCipher;
use database::DatabaseManager;
use errors::AppError;
use storage::FsObjectStore;
use suno::SunoSessions;

/// Builds application state from configuration.
pub async fn build_state(config: &AppConfig) -> Result<AppState, AppError> {
    let db = DatabaseManager::new(&config.database_path).await?;

    tokio::fs::create_dir_all(&config.storage_root).await?;
    log::info!("Storing media under {:?}", config.storage_root);
    let store = Arc::new(FsObjectStore::new(config.storage_root.clone()));

    let cipher = match config.encryption_key.as_deref() {
        Some(secret) => Some(CredentialCipher::new(secret)?),
        None => None,
    };

    Ok(AppState::new(
        db.pool,
        store,
        SunoSessions::new(config.suno.clone()),
        cipher,
        config.stripe_webhook_secret.clone(),
    ))
}

pub async fn run(config: AppConfig) -> Result<(), AppError> {
    let state = build_state(&config).await?;
    let app = api::build_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .map_err(|e| AppError::Config(format!("Cannot bind {}: {}", config.bind_addr, e)))?;
    log::info!("Listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .await
        .map_err(|e| AppError::Network(format!("Server error: {}", e)))
}
