use std::sync::Arc;
use std::time::Duration;

use crate::match_filter::is_unwanted_variant;
use crate::normalize::normalize_track;
use crate::ports::spotify::{SearchCandidate, SpotifyApiError, SpotifyClient};
use crate::queries::generate_queries;
use crate::source::SourceRecord;

use super::types::{JitterRange, ResolutionOutcome};

#[derive(Debug, Clone)]
pub struct ResolverSettings {
    /// Candidates requested per search call.
    pub search_limit: u32,
    /// Pause after every successful search.
    pub search_jitter: JitterRange,
    /// Added on top of the advertised rate-limit delay.
    pub rate_limit_jitter: JitterRange,
    /// Used when a rate-limit response carries no `Retry-After`.
    pub default_retry_after: Duration,
    /// Ceiling for a whole record. `None` waits out rate limits indefinitely.
    pub record_timeout: Option<Duration>,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            search_limit: 5,
            search_jitter: JitterRange::from_millis(100, 300),
            rate_limit_jitter: JitterRange::from_millis(500, 1500),
            default_retry_after: Duration::from_secs(1),
            record_timeout: None,
        }
    }
}

/// Maps one source record to a Spotify track id.
///
/// Holds nothing mutable besides the shared client, so a single resolver is
/// shared by every worker.
pub struct TrackResolver<C: SpotifyClient> {
    client: Arc<C>,
    settings: ResolverSettings,
}

impl<C: SpotifyClient> TrackResolver<C> {
    pub fn new(client: Arc<C>, settings: ResolverSettings) -> Self {
        Self { client, settings }
    }

    pub async fn resolve(&self, record: SourceRecord) -> ResolutionOutcome {
        let track_id = match self.settings.record_timeout {
            Some(limit) => match tokio::time::timeout(limit, self.find_track_id(&record)).await {
                Ok(track_id) => track_id,
                Err(_) => {
                    log::warn!(
                        "Gave up on '{}' after {:?}",
                        record.describe(),
                        limit
                    );
                    None
                }
            },
            None => self.find_track_id(&record).await,
        };

        match track_id {
            Some(track_id) => {
                log::debug!("Resolved '{}' to {}", record.describe(), track_id);
                ResolutionOutcome::found(record, track_id)
            }
            None => ResolutionOutcome::not_found(record),
        }
    }

    /// Walk the generated queries until one yields an acceptable candidate.
    async fn find_track_id(&self, record: &SourceRecord) -> Option<String> {
        let normalized = normalize_track(record);
        log::debug!(
            "Searching '{}' as '{}' (artists: {:?})",
            record.title,
            normalized.cleaned_title,
            normalized.artist_variants
        );
        let queries = generate_queries(&normalized.cleaned_title, &record.artist);

        for query in &queries {
            let candidates = match self.search_with_backoff(query).await {
                Ok(candidates) => candidates,
                Err(e) => {
                    log::warn!("Error searching '{}': {}", record.title, e);
                    return None;
                }
            };

            if let Some(candidate) = candidates
                .into_iter()
                .find(|candidate| !is_unwanted_variant(&candidate.display_name, &record.title))
            {
                log::debug!(
                    "Query '{}' matched '{}' for '{}'",
                    query,
                    candidate.display_name,
                    record.title
                );
                return Some(candidate.id);
            }
        }

        None
    }

    /// Search one query, re-issuing it for as long as Spotify rate limits us.
    async fn search_with_backoff(
        &self,
        query: &str,
    ) -> Result<Vec<SearchCandidate>, SpotifyApiError> {
        loop {
            log::debug!("Searching Spotify for '{}'", query);
            match self
                .client
                .search_tracks(query, self.settings.search_limit)
                .await
            {
                Ok(candidates) => {
                    tokio::time::sleep(self.settings.search_jitter.sample()).await;
                    return Ok(candidates);
                }
                Err(e) => {
                    let Some(delay) = e.retry_after(self.settings.default_retry_after) else {
                        return Err(e);
                    };
                    log::warn!("Rate limited. Retrying '{}' in {:?}", query, delay);
                    let pause = delay.saturating_add(self.settings.rate_limit_jitter.sample());
                    tokio::time::sleep(pause).await;
                }
            }
        }
    }
}
