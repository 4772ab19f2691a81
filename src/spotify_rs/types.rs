use serde::{Deserialize, Serialize};

/// Spotify OAuth token response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyTokenResponse {
    pub access_token: String,
    pub expires_in: u64,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Spotify user profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyUser {
    pub id: String,
    pub display_name: Option<String>,
}

/// Body of `GET /search?type=track`
#[derive(Debug, Clone, Deserialize)]
pub struct SpotifySearchResponse {
    pub tracks: SpotifyTrackPage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyTrackPage {
    /// Unavailable tracks come back as `null`.
    #[serde(default)]
    pub items: Vec<Option<SpotifySearchTrack>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotifySearchTrack {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatePlaylistRequest<'a> {
    pub name: &'a str,
    pub public: bool,
    pub description: &'a str,
}

/// Spotify playlist as returned on creation
#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyCreatedPlaylist {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AddItemsRequest {
    pub uris: Vec<String>,
}
