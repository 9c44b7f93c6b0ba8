use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::errors::AppError;
use crate::suno::SunoConfig;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

pub fn get_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tunehub")
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_path: PathBuf,
    pub storage_root: PathBuf,
    pub bind_addr: SocketAddr,
    pub encryption_key: Option<String>,
    pub stripe_webhook_secret: Option<String>,
    pub suno: SunoConfig,
}

impl AppConfig {
    /// Reads configuration from the environment, loading `.env` first if present.
    pub fn from_env() -> Result<Self, AppError> {
        if let Ok(path) = dotenvy::dotenv() {
            log::info!("Loaded environment overrides from {:?}", path);
        }

        let data_dir = get_data_dir();

        let database_path = non_empty_var("DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("library.db"));

        let storage_root = non_empty_var("STORAGE_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("media"));

        let bind_addr = non_empty_var("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| AppError::Config(format!("Invalid BIND_ADDR: {}", e)))?;

        let mut suno = SunoConfig::default();
        if let Some(url) = non_empty_var("SUNO_BASE_URL") {
            suno.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(url) = non_empty_var("SUNO_CLERK_BASE_URL") {
            suno.clerk_base_url = url.trim_end_matches('/').to_string();
        }

        let encryption_key = non_empty_var("ENCRYPTION_KEY");
        if encryption_key.is_none() {
            log::warn!("ENCRYPTION_KEY is not set; stored Suno cookies cannot be used");
        }

        let stripe_webhook_secret = non_empty_var("STRIPE_WEBHOOK_SECRET");
        if stripe_webhook_secret.is_none() {
            log::warn!("STRIPE_WEBHOOK_SECRET is not set; billing webhooks will be rejected");
        }

        Ok(Self {
            database_path,
            storage_root,
            bind_addr,
            encryption_key,
            stripe_webhook_secret,
            suno,
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}
