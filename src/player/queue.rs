use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::library::models::SongRef;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    #[default]
    Off,
    All,
    One,
}

/// Ordered list of songs of either kind plus a manual "up next" queue.
#[derive(Debug, Default)]
pub struct PlayQueue {
    songs: Vec<SongRef>,
    shuffled_indices: Vec<usize>,
    // Position in `songs`, or in `shuffled_indices` while shuffled
    current_index: Option<usize>,
    up_next: VecDeque<SongRef>,
    shuffle: bool,
    repeat: RepeatMode,
}

impl PlayQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn songs(&self) -> &[SongRef] {
        &self.songs
    }

    pub fn up_next(&self) -> impl Iterator<Item = &SongRef> {
        self.up_next.iter()
    }

    pub fn shuffle(&self) -> bool {
        self.shuffle
    }

    pub fn repeat(&self) -> RepeatMode {
        self.repeat
    }

    pub fn set_repeat(&mut self, repeat: RepeatMode) {
        self.repeat = repeat;
    }

    pub fn set_songs(&mut self, songs: Vec<SongRef>) {
        self.songs = songs;
        if self.shuffle {
            self.reshuffle();
        }
        self.current_index = if self.songs.is_empty() { None } else { Some(0) };
    }

    pub fn enqueue(&mut self, song: SongRef) {
        self.up_next.push_back(song);
    }

    pub fn clear(&mut self) {
        *self = Self {
            shuffle: self.shuffle,
            repeat: self.repeat,
            ..Self::default()
        };
    }

    pub fn toggle_shuffle(&mut self) {
        let current = self.current();
        self.shuffle = !self.shuffle;
        if self.shuffle {
            self.reshuffle();
        }

        match current {
            Some(song) => {
                self.jump_to(&song);
            }
            None => {
                self.current_index = if self.songs.is_empty() { None } else { Some(0) };
            }
        }
    }

    fn reshuffle(&mut self) {
        let mut rng = rand::rng();
        self.shuffled_indices = (0..self.songs.len()).collect();
        self.shuffled_indices.shuffle(&mut rng);
    }

    /// Advances and returns the next song. `manual_skip` bypasses repeat-one.
    pub fn next(&mut self, manual_skip: bool) -> Option<SongRef> {
        if let Some(song) = self.up_next.pop_front() {
            return Some(song);
        }

        if !manual_skip && self.repeat == RepeatMode::One {
            if let Some(song) = self.current() {
                return Some(song);
            }
        }

        let next_idx = self.current_index.map_or(0, |idx| idx + 1);
        if next_idx >= self.songs.len() {
            if self.repeat == RepeatMode::All && !self.songs.is_empty() {
                self.current_index = Some(0);
                return self.song_at(0);
            }
            return None;
        }

        self.current_index = Some(next_idx);
        self.song_at(next_idx)
    }

    pub fn previous(&mut self) -> Option<SongRef> {
        if self.songs.is_empty() {
            return None;
        }

        let prev_idx = match self.current_index {
            Some(0) if self.repeat == RepeatMode::All => self.songs.len() - 1,
            Some(0) | None => 0,
            Some(idx) => idx - 1,
        };

        self.current_index = Some(prev_idx);
        self.song_at(prev_idx)
    }

    fn song_at(&self, index: usize) -> Option<SongRef> {
        if self.shuffle {
            let real_index = self.shuffled_indices.get(index)?;
            self.songs.get(*real_index).cloned()
        } else {
            self.songs.get(index).cloned()
        }
    }

    pub fn current(&self) -> Option<SongRef> {
        self.current_index.and_then(|idx| self.song_at(idx))
    }

    /// Next song without advancing.
    pub fn peek_next(&self) -> Option<SongRef> {
        if let Some(song) = self.up_next.front() {
            return Some(song.clone());
        }
        if self.repeat == RepeatMode::One {
            return self.current();
        }

        let next_idx = self.current_index.map_or(0, |idx| idx + 1);
        if next_idx >= self.songs.len() {
            if self.repeat == RepeatMode::All {
                return self.song_at(0);
            }
            return None;
        }
        self.song_at(next_idx)
    }

    /// Moves the cursor to `song`. Returns false if it is not in the list.
    pub fn jump_to(&mut self, song: &SongRef) -> bool {
        let Some(index) = self.songs.iter().position(|s| s == song) else {
            return false;
        };
        if self.shuffle {
            if let Some(pos) = self.shuffled_indices.iter().position(|&i| i == index) {
                self.current_index = Some(pos);
            }
        } else {
            self.current_index = Some(index);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn songs() -> Vec<SongRef> {
        vec![
            SongRef::Regular("a".into()),
            SongRef::Suno("b".into()),
            SongRef::Regular("c".into()),
        ]
    }

    #[test]
    fn test_sequential_playback_with_mixed_kinds() {
        let mut queue = PlayQueue::new();
        queue.set_songs(songs());
        assert_eq!(queue.current(), Some(SongRef::Regular("a".into())));
        assert_eq!(queue.next(true), Some(SongRef::Suno("b".into())));
        assert_eq!(queue.next(true), Some(SongRef::Regular("c".into())));
        assert_eq!(queue.next(true), None);
        assert_eq!(queue.previous(), Some(SongRef::Suno("b".into())));
    }

    #[test]
    fn test_repeat_modes() {
        let mut queue = PlayQueue::new();
        queue.set_songs(songs());
        queue.set_repeat(RepeatMode::One);
        assert_eq!(queue.next(false), Some(SongRef::Regular("a".into())));
        assert_eq!(queue.next(true), Some(SongRef::Suno("b".into())));

        queue.set_repeat(RepeatMode::All);
        queue.next(true);
        assert_eq!(queue.peek_next(), Some(SongRef::Regular("a".into())));
        assert_eq!(queue.next(true), Some(SongRef::Regular("a".into())));
        assert_eq!(queue.previous(), Some(SongRef::Regular("c".into())));
    }

    #[test]
    fn test_up_next_takes_priority() {
        let mut queue = PlayQueue::new();
        queue.set_songs(songs());
        queue.enqueue(SongRef::Suno("z".into()));
        assert_eq!(queue.peek_next(), Some(SongRef::Suno("z".into())));
        assert_eq!(queue.next(true), Some(SongRef::Suno("z".into())));
        assert_eq!(queue.next(true), Some(SongRef::Suno("b".into())));
    }

    #[test]
    fn test_shuffle_keeps_current_song() {
        let mut queue = PlayQueue::new();
        queue.set_songs(songs());
        queue.next(true);
        let before = queue.current();

        queue.toggle_shuffle();
        assert!(queue.shuffle());
        assert_eq!(queue.current(), before);

        let mut seen = vec![queue.current().unwrap()];
        while let Some(song) = queue.next(true) {
            seen.push(song);
        }
        queue.toggle_shuffle();
        assert_eq!(queue.current(), seen.last().cloned());
    }

    #[test]
    fn test_empty_queue() {
        let mut queue = PlayQueue::new();
        queue.set_repeat(RepeatMode::All);
        assert_eq!(queue.next(true), None);
        assert_eq!(queue.previous(), None);
        assert!(!queue.jump_to(&SongRef::Regular("a".into())));
    }
}
