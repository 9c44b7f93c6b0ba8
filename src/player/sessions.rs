use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::limiter::{PlayCountLimiter, DEFAULT_PLAY_COOLDOWN};
use super::store::{PlayerAction, PlayerState, PlayerStore};
use super::tracker::PlayTracker;
use crate::errors::AppError;
use crate::library::models::SongRef;
use crate::library::LibraryManager;

/// A listener's player and the tracker that counts its plays.
pub struct UserPlayer {
    pub store: PlayerStore,
    pub tracker: Arc<PlayTracker>,
}

/// Players keyed by user id, created on first use. Cooldowns are per
/// listener: each player has its own limiter.
pub struct PlayerSessions {
    library: Arc<LibraryManager>,
    cooldown: Duration,
    players: Mutex<HashMap<String, Arc<UserPlayer>>>,
}

impl PlayerSessions {
    pub fn new(library: Arc<LibraryManager>) -> Self {
        Self::with_cooldown(library, DEFAULT_PLAY_COOLDOWN)
    }

    pub fn with_cooldown(library: Arc<LibraryManager>, cooldown: Duration) -> Self {
        Self {
            library,
            cooldown,
            players: Mutex::new(HashMap::new()),
        }
    }

    /// The user's player. A new player starts a watcher that records a play
    /// each time the store moves to a different song; the watcher ends when
    /// the player is dropped.
    pub fn player(&self, user_id: &str) -> Arc<UserPlayer> {
        self.players
            .lock()
            .entry(user_id.to_string())
            .or_insert_with(|| {
                let store = PlayerStore::new();
                let tracker = Arc::new(PlayTracker::new(
                    self.library.clone(),
                    PlayCountLimiter::new(self.cooldown),
                ));
                tracker.clone().watch(store.subscribe());
                log::debug!("Started player for user {}", user_id);
                Arc::new(UserPlayer { store, tracker })
            })
            .clone()
    }

    pub fn state(&self, user_id: &str) -> PlayerState {
        self.players
            .lock()
            .get(user_id)
            .map(|p| p.store.state())
            .unwrap_or_default()
    }

    pub fn dispatch(&self, user_id: &str, action: PlayerAction) -> PlayerState {
        self.player(user_id).store.dispatch(action)
    }

    /// Counts a play reported directly by a client. Shares the cooldown with
    /// plays the store triggers.
    pub async fn record_play(&self, user_id: &str, song: &SongRef) -> Result<bool, AppError> {
        let player = self.player(user_id);
        player.tracker.record_play(song).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::DatabaseManager;
    use crate::library::generated::tests::clip;
    use crate::suno::ClipStatus;

    async fn setup() -> (Arc<LibraryManager>, PlayerSessions, SongRef) {
        let db = DatabaseManager::in_memory().await.unwrap();
        let library = Arc::new(LibraryManager::new(db.pool));
        let stored = library
            .upsert_suno_clips("u1", &[clip("c1", ClipStatus::Complete)])
            .await
            .unwrap();
        let sessions = PlayerSessions::new(library.clone());
        (library, sessions, SongRef::Suno(stored[0].id.clone()))
    }

    async fn play_count(library: &LibraryManager, song: &SongRef) -> i64 {
        library.get_suno_song(song.id()).await.unwrap().play_count
    }

    #[tokio::test]
    async fn test_cooldown_is_per_listener() {
        let (library, sessions, song) = setup().await;

        assert!(sessions.record_play("u1", &song).await.unwrap());
        assert!(!sessions.record_play("u1", &song).await.unwrap());
        assert!(sessions.record_play("u2", &song).await.unwrap());
        assert_eq!(play_count(&library, &song).await, 2);
    }

    #[tokio::test]
    async fn test_dispatched_play_is_counted_once() {
        let (library, sessions, song) = setup().await;
        assert_eq!(sessions.state("u1"), PlayerState::default());

        let state = sessions.dispatch("u1", PlayerAction::Play(song.clone()));
        assert_eq!(state.now_playing.as_ref(), Some(&song));
        assert_eq!(sessions.state("u1").now_playing, Some(song.clone()));

        for _ in 0..50 {
            if play_count(&library, &song).await == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(play_count(&library, &song).await, 1);

        // Same listener reporting the same play inside the cooldown.
        assert!(!sessions.record_play("u1", &song).await.unwrap());
        assert_eq!(play_count(&library, &song).await, 1);
    }
}
