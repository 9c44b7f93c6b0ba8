use rand::Rng;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://studio-api.prod.suno.com";
pub const DEFAULT_CLERK_BASE_URL: &str = "https://clerk.suno.com";
pub const CLERK_VERSION_URL: &str = "https://data.jsdelivr.com/v1/package/npm/@clerk/clerk-js";
pub const DEFAULT_MODEL: &str = "chirp-v3-5";
pub const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

pub const REQUEST_TIMEOUT_SECONDS: u64 = 10;
pub const INITIAL_POLL_DELAY_SECONDS: u64 = 5;
pub const POLL_INTERVAL_MIN_SECONDS: u64 = 3;
pub const POLL_INTERVAL_MAX_SECONDS: u64 = 6;
pub const WAIT_AUDIO_TIMEOUT_SECONDS: u64 = 100;
pub const KEEP_ALIVE_JITTER_MIN_MS: u64 = 1000;
pub const KEEP_ALIVE_JITTER_MAX_MS: u64 = 2000;
pub const LYRICS_POLL_INTERVAL_SECONDS: u64 = 2;

/// Returns a uniformly random duration in `[min, max]`.
pub fn jitter(min: Duration, max: Duration) -> Duration {
    if max <= min {
        return min;
    }
    let millis = rand::rng().random_range(min.as_millis() as u64..=max.as_millis() as u64);
    Duration::from_millis(millis)
}

/// Timing for the completion poller.
#[derive(Clone, Debug)]
pub struct PollPolicy {
    pub initial_delay: Duration,
    pub min_interval: Duration,
    pub max_interval: Duration,
    pub timeout: Duration,
}

impl PollPolicy {
    pub fn next_interval(&self) -> Duration {
        jitter(self.min_interval, self.max_interval)
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(INITIAL_POLL_DELAY_SECONDS),
            min_interval: Duration::from_secs(POLL_INTERVAL_MIN_SECONDS),
            max_interval: Duration::from_secs(POLL_INTERVAL_MAX_SECONDS),
            timeout: Duration::from_secs(WAIT_AUDIO_TIMEOUT_SECONDS),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SunoConfig {
    pub base_url: String,
    pub clerk_base_url: String,
    pub clerk_version_url: String,
    pub user_agent: String,
    pub default_model: String,
    pub request_timeout: Duration,
    pub poll: PollPolicy,
    pub keep_alive_jitter: (Duration, Duration),
    pub lyrics_poll_interval: Duration,
}

impl Default for SunoConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            clerk_base_url: DEFAULT_CLERK_BASE_URL.to_string(),
            clerk_version_url: CLERK_VERSION_URL.to_string(),
            user_agent: USER_AGENT.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECONDS),
            poll: PollPolicy::default(),
            keep_alive_jitter: (
                Duration::from_millis(KEEP_ALIVE_JITTER_MIN_MS),
                Duration::from_millis(KEEP_ALIVE_JITTER_MAX_MS),
            ),
            lyrics_poll_interval: Duration::from_secs(LYRICS_POLL_INTERVAL_SECONDS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jitter_stays_in_range() {
        let min = Duration::from_secs(3);
        let max = Duration::from_secs(6);
        for _ in 0..200 {
            let d = jitter(min, max);
            assert!(d >= min && d <= max, "{:?} out of range", d);
        }
    }

    #[test]
    fn test_jitter_degenerate_range() {
        let d = Duration::from_millis(250);
        assert_eq!(jitter(d, d), d);
        assert_eq!(jitter(d, Duration::ZERO), d);
    }
}
