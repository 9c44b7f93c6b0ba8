use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::limiter::PlayCountLimiter;
use super::store::PlayerState;
use crate::errors::AppError;
use crate::library::models::SongRef;
use crate::library::LibraryManager;

/// Turns plays into play-count increments, subject to the limiter.
pub struct PlayTracker {
    library: Arc<LibraryManager>,
    limiter: PlayCountLimiter,
}

impl PlayTracker {
    pub fn new(library: Arc<LibraryManager>, limiter: PlayCountLimiter) -> Self {
        Self { library, limiter }
    }

    /// Returns whether the play was counted.
    pub async fn record_play(&self, song: &SongRef) -> Result<bool, AppError> {
        if !self.limiter.try_acquire(song) {
            log::debug!("Play of {} {} inside cooldown", song.song_type(), song.id());
            return Ok(false);
        }

        if let Err(e) = self.library.increment_play_count(song).await {
            self.limiter.forget(song);
            return Err(e);
        }
        Ok(true)
    }

    /// Records a play whenever the store starts a different song. Ends when
    /// the store is dropped.
    pub fn watch(self: Arc<Self>, mut rx: watch::Receiver<PlayerState>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut last: Option<SongRef> = rx.borrow_and_update().now_playing.clone();
            while rx.changed().await.is_ok() {
                let now_playing = rx.borrow_and_update().now_playing.clone();
                if let Some(song) = now_playing.as_ref().filter(|s| last.as_ref() != Some(*s)) {
                    if let Err(e) = self.record_play(song).await {
                        log::warn!("Failed to record play of {}: {}", song.id(), e);
                    }
                }
                last = now_playing;
            }
        })
    }
}
