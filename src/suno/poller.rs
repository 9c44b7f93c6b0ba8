//! Bounded polling for asynchronous generation jobs.
//!
//! After an initial delay the poller fetches job status repeatedly. It stops
//! when every clip is playable (`streaming`/`complete`) or every clip has
//! errored. Mixed states keep polling. Between polls it sleeps a jittered
//! interval and renews the bearer token. When the wall-clock timeout elapses
//! the last snapshot is returned as [`GenerationOutcome::TimedOut`].

use async_trait::async_trait;
use tokio::time::{sleep, Instant};

use super::config::PollPolicy;
use super::error::SunoError;
use super::models::{AudioInfo, ClipStatus, GenerationOutcome};

#[async_trait]
pub trait StatusSource: Send {
    async fn fetch_status(&mut self, ids: &[String]) -> Result<Vec<AudioInfo>, SunoError>;

    async fn renew(&mut self) -> Result<(), SunoError>;
}

/// Classifies a snapshot, returning an outcome only for terminal states.
pub fn settle(clips: Vec<AudioInfo>) -> Result<GenerationOutcome, Vec<AudioInfo>> {
    if clips.is_empty() {
        return Err(clips);
    }
    if clips.iter().all(|c| c.status.is_playable()) {
        return Ok(GenerationOutcome::Completed(clips));
    }
    if clips.iter().all(|c| c.status == ClipStatus::Error) {
        return Ok(GenerationOutcome::Failed(clips));
    }
    Err(clips)
}

pub async fn poll_until_settled<S>(
    source: &mut S,
    ids: &[String],
    policy: &PollPolicy,
) -> Result<GenerationOutcome, SunoError>
where
    S: StatusSource + ?Sized,
{
    let started = Instant::now();
    let mut last_snapshot: Vec<AudioInfo> = Vec::new();
    let mut attempt = 0u32;

    sleep(policy.initial_delay).await;

    while started.elapsed() < policy.timeout {
        attempt += 1;
        let clips = source.fetch_status(ids).await?;

        match settle(clips) {
            Ok(outcome) => {
                log::info!(
                    "Generation settled after {} poll(s) in {:?}: {} clip(s)",
                    attempt,
                    started.elapsed(),
                    outcome.clips().len()
                );
                return Ok(outcome);
            }
            Err(pending) => {
                log::debug!(
                    "Poll {}: {:?}",
                    attempt,
                    pending.iter().map(|c| c.status).collect::<Vec<_>>()
                );
                last_snapshot = pending;
            }
        }

        sleep(policy.next_interval()).await;
        source.renew().await?;
    }

    log::warn!(
        "Generation still processing after {:?}; returning last snapshot of {} clip(s)",
        policy.timeout,
        last_snapshot.len()
    );
    Ok(GenerationOutcome::TimedOut(last_snapshot))
}
