//! Playback state per listener: queue, typed actions with change
//! notification, and rate-limited play counting.

pub mod limiter;
pub mod queue;
pub mod sessions;
pub mod store;
pub mod tracker;

pub use limiter::{PlayCountLimiter, DEFAULT_PLAY_COOLDOWN};
pub use queue::{PlayQueue, RepeatMode};
pub use sessions::{PlayerSessions, UserPlayer};
pub use store::{PlayerAction, PlayerState, PlayerStore};
pub use tracker::PlayTracker;
