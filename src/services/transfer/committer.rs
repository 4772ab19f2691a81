use std::sync::Arc;
use std::time::Duration;

use color_eyre::eyre::{Result, WrapErr};

use crate::ports::spotify::{SpotifyApiError, SpotifyClient};
use crate::source::DEFAULT_PLAYLIST_NAME;

use super::types::{ChunkFailure, CommitReport, JitterRange};

#[derive(Debug, Clone)]
pub struct CommitSettings {
    /// Spotify accepts at most 100 items per add call.
    pub batch_size: usize,
    /// Total attempts per chunk while rate limited.
    pub max_attempts: u32,
    pub rate_limit_jitter: JitterRange,
    pub default_retry_after: Duration,
}

impl Default for CommitSettings {
    fn default() -> Self {
        Self {
            batch_size: 100,
            max_attempts: 3,
            rate_limit_jitter: JitterRange::from_millis(500, 1500),
            default_retry_after: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CommitError {
    #[error("Still rate limited after {attempts} attempts")]
    RateLimitExhausted { attempts: u32 },
    #[error(transparent)]
    Api(#[from] SpotifyApiError),
}

/// `name` trimmed, or the default playlist name when nothing is left.
pub fn playlist_name_or_default(name: &str) -> String {
    let name = name.trim();
    if name.is_empty() {
        DEFAULT_PLAYLIST_NAME.to_string()
    } else {
        name.to_string()
    }
}

pub struct PlaylistCommitter<C: SpotifyClient> {
    client: Arc<C>,
    settings: CommitSettings,
}

impl<C: SpotifyClient> PlaylistCommitter<C> {
    pub fn new(client: Arc<C>, settings: CommitSettings) -> Self {
        Self { client, settings }
    }

    /// Create a public playlist for the current user, returning its id.
    pub async fn create_playlist(&self, name: &str) -> Result<String> {
        let name = playlist_name_or_default(name);

        let owner_id = self
            .client
            .current_user_id()
            .await
            .wrap_err("Failed to fetch the current Spotify user")?;

        let playlist_id = self
            .client
            .create_playlist(&owner_id, &name, true)
            .await
            .wrap_err_with(|| format!("Failed to create playlist '{}'", name))?;

        log::info!("Created playlist '{}' ({})", name, playlist_id);
        Ok(playlist_id)
    }

    /// Add every id in chunks of at most `batch_size`.
    ///
    /// A failed chunk is recorded and the following chunks are still
    /// submitted; nothing already added is rolled back.
    pub async fn add_tracks(&self, playlist_id: &str, track_ids: &[String]) -> CommitReport {
        let mut report = CommitReport::default();
        if track_ids.is_empty() {
            return report;
        }

        log::info!("Adding {} tracks to playlist {}", track_ids.len(), playlist_id);

        for (index, chunk) in track_ids
            .chunks(self.settings.batch_size.max(1))
            .enumerate()
        {
            match self.safe_add_items(playlist_id, chunk).await {
                Ok(()) => report.added += chunk.len(),
                Err(e) => {
                    log::error!(
                        "Failed to add batch {} ({} tracks) to playlist {}: {}",
                        index + 1,
                        chunk.len(),
                        playlist_id,
                        e
                    );
                    report.failed_chunks.push(ChunkFailure {
                        index,
                        size: chunk.len(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        report
    }

    /// Submit one chunk, retrying only on rate limits.
    pub async fn safe_add_items(
        &self,
        playlist_id: &str,
        chunk: &[String],
    ) -> Result<(), CommitError> {
        let max_attempts = self.settings.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            let e = match self.client.add_items(playlist_id, chunk).await {
                Ok(()) => return Ok(()),
                Err(e) => e,
            };

            let Some(delay) = e.retry_after(self.settings.default_retry_after) else {
                return Err(CommitError::Api(e));
            };

            if attempt == max_attempts {
                break;
            }

            log::warn!(
                "Rate limited while adding items (attempt {}/{}). Retrying in {:?}",
                attempt,
                max_attempts,
                delay
            );
            let pause = delay.saturating_add(self.settings.rate_limit_jitter.sample());
            tokio::time::sleep(pause).await;
        }

        Err(CommitError::RateLimitExhausted {
            attempts: max_attempts,
        })
    }
}
