use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::library::models::SongRef;

/// Plays of the same song inside this window count once.
pub const DEFAULT_PLAY_COOLDOWN: Duration = Duration::from_secs(30);

/// Per-song cooldown for play counting.
pub struct PlayCountLimiter {
    cooldown: Duration,
    last_counted: Mutex<HashMap<SongRef, Instant>>,
}

impl PlayCountLimiter {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_counted: Mutex::new(HashMap::new()),
        }
    }

    pub fn try_acquire(&self, song: &SongRef) -> bool {
        self.try_acquire_at(song, Instant::now())
    }

    /// Returns true and starts a new window if `song` is outside its
    /// cooldown at `now`.
    pub fn try_acquire_at(&self, song: &SongRef, now: Instant) -> bool {
        let mut last_counted = self.last_counted.lock();
        match last_counted.get(song) {
            Some(&last) if now.saturating_duration_since(last) < self.cooldown => false,
            _ => {
                last_counted.insert(song.clone(), now);
                // keep the map bounded by dropping expired windows
                let cooldown = self.cooldown;
                last_counted.retain(|_, t| now.saturating_duration_since(*t) < cooldown);
                true
            }
        }
    }

    /// Releases a window, e.g. when the increment it guarded failed.
    pub fn forget(&self, song: &SongRef) {
        self.last_counted.lock().remove(song);
    }
}

impl Default for PlayCountLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_PLAY_COOLDOWN)
    }
}
