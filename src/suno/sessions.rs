use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};

use super::client::SunoClient;
use super::config::SunoConfig;
use super::error::SunoError;

pub type SharedSunoClient = Arc<Mutex<SunoClient>>;

type Slot = Arc<OnceCell<SharedSunoClient>>;

/// Initialised clients, one per cookie, reused across requests.
///
/// Keys are SHA-256 digests so raw cookies are not held as map keys. The map
/// lock only guards slot lookup; bootstrapping runs inside the cookie's own
/// slot, so a slow Clerk round-trip for one cookie never blocks another.
pub struct SunoSessions {
    config: SunoConfig,
    clients: parking_lot::Mutex<HashMap<String, Slot>>,
}

impl SunoSessions {
    pub fn new(config: SunoConfig) -> Self {
        Self {
            config,
            clients: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    fn key(cookie: &str) -> String {
        hex::encode(Sha256::digest(cookie.trim().as_bytes()))
    }

    pub async fn client_for(&self, cookie: &str) -> Result<SharedSunoClient, SunoError> {
        let key = Self::key(cookie);
        let slot = self.clients.lock().entry(key.clone()).or_default().clone();

        let result = slot
            .get_or_try_init(|| async {
                let client = SunoClient::initialize(cookie, self.config.clone()).await?;
                log::debug!("Cached Suno client for a new session");
                Ok::<_, SunoError>(Arc::new(Mutex::new(client)))
            })
            .await
            .cloned();

        if result.is_err() {
            // Leave no empty slot behind, unless another caller already
            // replaced it.
            let mut clients = self.clients.lock();
            if clients
                .get(&key)
                .is_some_and(|s| Arc::ptr_eq(s, &slot) && !s.initialized())
            {
                clients.remove(&key);
            }
        }
        result
    }

    /// Drops the cached client for a cookie, e.g. when it is replaced or rejected.
    pub async fn evict(&self, cookie: &str) -> bool {
        self.clients
            .lock()
            .remove(&Self::key(cookie))
            .is_some_and(|slot| slot.initialized())
    }

    /// Number of initialised clients.
    pub async fn len(&self) -> usize {
        self.clients
            .lock()
            .values()
            .filter(|slot| slot.initialized())
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
