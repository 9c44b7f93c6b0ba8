use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use super::queue::{PlayQueue, RepeatMode};
use crate::library::models::SongRef;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum PlayerAction {
    /// Replaces the list; playback starts at `start` when it is in the list.
    SetQueue {
        songs: Vec<SongRef>,
        start: Option<SongRef>,
    },
    Play(SongRef),
    Enqueue(SongRef),
    Next,
    Previous,
    ToggleShuffle,
    SetRepeat(RepeatMode),
    Reset,
}

/// Snapshot published to subscribers after every action.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    pub songs: Vec<SongRef>,
    pub up_next: Vec<SongRef>,
    pub now_playing: Option<SongRef>,
    pub shuffle: bool,
    pub repeat: RepeatMode,
}

pub struct PlayerStore {
    queue: Mutex<PlayQueue>,
    now_playing: Mutex<Option<SongRef>>,
    tx: watch::Sender<PlayerState>,
}

impl PlayerStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(PlayerState::default());
        Self {
            queue: Mutex::new(PlayQueue::new()),
            now_playing: Mutex::new(None),
            tx,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<PlayerState> {
        self.tx.subscribe()
    }

    pub fn state(&self) -> PlayerState {
        self.tx.borrow().clone()
    }

    pub fn dispatch(&self, action: PlayerAction) -> PlayerState {
        let mut queue = self.queue.lock();
        let mut now_playing = self.now_playing.lock();

        match action {
            PlayerAction::SetQueue { songs, start } => {
                queue.set_songs(songs);
                if let Some(start) = start {
                    queue.jump_to(&start);
                }
                *now_playing = queue.current();
            }
            PlayerAction::Play(song) => {
                if !queue.jump_to(&song) {
                    queue.set_songs(vec![song.clone()]);
                }
                *now_playing = Some(song);
            }
            PlayerAction::Enqueue(song) => queue.enqueue(song),
            PlayerAction::Next => *now_playing = queue.next(true),
            PlayerAction::Previous => *now_playing = queue.previous(),
            PlayerAction::ToggleShuffle => queue.toggle_shuffle(),
            PlayerAction::SetRepeat(mode) => queue.set_repeat(mode),
            PlayerAction::Reset => {
                queue.clear();
                *now_playing = None;
            }
        }

        let state = PlayerState {
            songs: queue.songs().to_vec(),
            up_next: queue.up_next().cloned().collect(),
            now_playing: now_playing.clone(),
            shuffle: queue.shuffle(),
            repeat: queue.repeat(),
        };
        self.tx.send_replace(state.clone());
        state
    }
}

impl Default for PlayerStore {
    fn default() -> Self {
        Self::new()
    }
}
