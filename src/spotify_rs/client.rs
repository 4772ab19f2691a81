use std::num::NonZeroU32;
use std::time::Duration;

use governor::{
    Quota, RateLimiter, clock::DefaultClock, state::InMemoryState, state::direct::NotKeyed,
};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{RequestBuilder, Response, StatusCode};

use crate::ports::spotify::{MAX_RETRY_AFTER, SearchCandidate, SpotifyApiError, SpotifyClient};
use crate::spotify_rs::types::{
    AddItemsRequest, CreatePlaylistRequest, SpotifyCreatedPlaylist, SpotifySearchResponse,
    SpotifyUser,
};

pub const SPOTIFY_API_URL: &str = "https://api.spotify.com/v1";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const PLAYLIST_DESCRIPTION: &str = "Transferred with trackswap";

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Spotify Web API client
pub struct SpotifyHttpClient {
    access_token: String,
    client: reqwest::Client,
    base_url: String,
    rate_limiter: Option<DirectRateLimiter>,
}

impl SpotifyHttpClient {
    pub fn new(access_token: String) -> Self {
        Self {
            access_token,
            client: reqwest::Client::new(),
            base_url: SPOTIFY_API_URL.to_string(),
            rate_limiter: None,
        }
    }

    /// Point the client at another API root, e.g. a local test server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Pace outgoing requests client-side. `0` disables pacing.
    pub fn with_requests_per_second(mut self, requests_per_second: u32) -> Self {
        self.rate_limiter = NonZeroU32::new(requests_per_second).map(|per_second| {
            log::debug!("Pacing Spotify requests at {} per second", per_second);
            RateLimiter::direct(Quota::per_second(per_second))
        });
        self
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, SpotifyApiError> {
        if let Some(rate_limiter) = &self.rate_limiter {
            rate_limiter.until_ready().await;
        }

        let response = request
            .bearer_auth(&self.access_token)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(SpotifyApiError::Transport)?;

        check_status(response).await
    }
}

/// Map 429 and other non-success responses onto [`SpotifyApiError`].
async fn check_status(response: Response) -> Result<Response, SpotifyApiError> {
    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(SpotifyApiError::RateLimited {
            retry_after_secs: parse_retry_after(response.headers()),
        });
    }

    if !status.is_success() {
        return Err(SpotifyApiError::Api {
            status: status.as_u16(),
            message: response
                .text()
                .await
                .unwrap_or("Failed to get error text".to_string()),
        });
    }

    Ok(response)
}

/// `Retry-After` in whole seconds, capped at [`MAX_RETRY_AFTER`]. Fractional
/// values round up.
fn parse_retry_after(headers: &HeaderMap) -> Option<u64> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
    let secs = value.parse::<u64>().ok().or_else(|| {
        value
            .parse::<f64>()
            .ok()
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
            .map(|secs| secs.ceil() as u64)
    })?;
    Some(secs.min(MAX_RETRY_AFTER.as_secs()))
}

fn to_track_uri(track_id: &str) -> String {
    if track_id.starts_with("spotify:") {
        track_id.to_string()
    } else {
        format!("spotify:track:{}", track_id)
    }
}

fn to_candidates(response: SpotifySearchResponse) -> Vec<SearchCandidate> {
    response
        .tracks
        .items
        .into_iter()
        .flatten()
        .map(|track| SearchCandidate {
            id: track.id,
            display_name: track.name,
        })
        .collect()
}

#[async_trait::async_trait]
impl SpotifyClient for SpotifyHttpClient {
    async fn search_tracks(
        &self,
        query: &str,
        limit: u32,
    ) -> Result<Vec<SearchCandidate>, SpotifyApiError> {
        let limit = limit.to_string();
        let request = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&[("q", query), ("type", "track"), ("limit", limit.as_str())]);

        let response: SpotifySearchResponse = self
            .send(request)
            .await?
            .json()
            .await
            .map_err(SpotifyApiError::Decode)?;

        Ok(to_candidates(response))
    }

    async fn current_user_id(&self) -> Result<String, SpotifyApiError> {
        let request = self.client.get(format!("{}/me", self.base_url));
        let user: SpotifyUser = self
            .send(request)
            .await?
            .json()
            .await
            .map_err(SpotifyApiError::Decode)?;

        log::debug!(
            "Authenticated as Spotify user {} ({})",
            user.id,
            user.display_name.as_deref().unwrap_or("no display name")
        );
        Ok(user.id)
    }

    async fn create_playlist(
        &self,
        owner_id: &str,
        name: &str,
        public: bool,
    ) -> Result<String, SpotifyApiError> {
        let request = self
            .client
            .post(format!(
                "{}/users/{}/playlists",
                self.base_url,
                urlencoding::encode(owner_id)
            ))
            .json(&CreatePlaylistRequest {
                name,
                public,
                description: PLAYLIST_DESCRIPTION,
            });

        let playlist: SpotifyCreatedPlaylist = self
            .send(request)
            .await?
            .json()
            .await
            .map_err(SpotifyApiError::Decode)?;

        log::info!("Created Spotify playlist '{}' ({})", playlist.name, playlist.id);
        Ok(playlist.id)
    }

    async fn add_items(
        &self,
        playlist_id: &str,
        track_ids: &[String],
    ) -> Result<(), SpotifyApiError> {
        let request = self
            .client
            .post(format!(
                "{}/playlists/{}/tracks",
                self.base_url,
                urlencoding::encode(playlist_id)
            ))
            .json(&AddItemsRequest {
                uris: track_ids.iter().map(|id| to_track_uri(id)).collect(),
            });

        self.send(request).await?;
        Ok(())
    }
}
