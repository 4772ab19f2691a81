use std::time::Duration;

/// Longest rate-limit pause honoured, whatever the response advertises.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

/// A track returned by the Spotify search API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCandidate {
    /// Opaque Spotify track id.
    pub id: String,
    pub display_name: String,
}

#[derive(Debug, thiserror::Error)]
pub enum SpotifyApiError {
    #[error("Rate limited by Spotify (retry after {retry_after_secs:?}s)")]
    RateLimited { retry_after_secs: Option<u64> },
    #[error("Spotify API error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("Failed to send http request: {0}")]
    Transport(reqwest::Error),
    #[error("Failed to parse response: {0}")]
    Decode(reqwest::Error),
}

impl SpotifyApiError {
    /// The advertised delay of a rate-limit response, or `fallback` when the
    /// response did not carry one, capped at [`MAX_RETRY_AFTER`]. `None` for
    /// every other error.
    pub fn retry_after(&self, fallback: Duration) -> Option<Duration> {
        match self {
            SpotifyApiError::RateLimited { retry_after_secs } => Some(
                retry_after_secs
                    .map(Duration::from_secs)
                    .unwrap_or(fallback)
                    .min(MAX_RETRY_AFTER),
            ),
            _ => None,
        }
    }
}

/// Port trait wrapping the Spotify API capabilities used by the transfer.
///
/// The production implementation lives in `spotify_rs::client`; tests use
/// the generated mock or the fake in `test_utils`.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait SpotifyClient: Send + Sync {
    /// Search tracks, returning at most `limit` candidates in API order.
    async fn search_tracks(
        &self,
        query: &str,
        limit: u32,
    ) -> Result<Vec<SearchCandidate>, SpotifyApiError>;

    async fn current_user_id(&self) -> Result<String, SpotifyApiError>;

    /// Create a playlist owned by `owner_id`, returning its id.
    async fn create_playlist(
        &self,
        owner_id: &str,
        name: &str,
        public: bool,
    ) -> Result<String, SpotifyApiError>;

    async fn add_items(
        &self,
        playlist_id: &str,
        track_ids: &[String],
    ) -> Result<(), SpotifyApiError>;
}
