use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::ports::spotify::{SearchCandidate, SpotifyApiError, SpotifyClient};

#[derive(Default)]
struct FakeState {
    search_results: HashMap<String, Vec<SearchCandidate>>,
    panic_queries: HashSet<String>,
    searches: Vec<String>,
    in_flight: usize,
    max_in_flight: usize,
    created_playlists: Vec<String>,
    added: Vec<(String, Vec<String>)>,
}

/// In-memory Spotify double for multi-record scenarios where scripting a
/// mock per call would be noise. Clones share state.
#[derive(Clone, Default)]
pub struct FakeSpotifyClient {
    state: Arc<Mutex<FakeState>>,
    search_delay: Duration,
}

impl FakeSpotifyClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search_delay(mut self, delay: Duration) -> Self {
        self.search_delay = delay;
        self
    }

    /// Candidates returned for exactly `query`; every other query returns nothing.
    pub fn add_search_result(&self, query: &str, candidates: Vec<SearchCandidate>) {
        self.state
            .lock()
            .unwrap()
            .search_results
            .insert(query.to_string(), candidates);
    }

    pub fn panic_on_query(&self, query: &str) {
        self.state
            .lock()
            .unwrap()
            .panic_queries
            .insert(query.to_string());
    }

    pub fn searches(&self) -> Vec<String> {
        self.state.lock().unwrap().searches.clone()
    }

    pub fn max_in_flight_searches(&self) -> usize {
        self.state.lock().unwrap().max_in_flight
    }

    pub fn created_playlists(&self) -> Vec<String> {
        self.state.lock().unwrap().created_playlists.clone()
    }

    pub fn added_items(&self) -> Vec<(String, Vec<String>)> {
        self.state.lock().unwrap().added.clone()
    }
}

#[async_trait::async_trait]
impl SpotifyClient for FakeSpotifyClient {
    async fn search_tracks(
        &self,
        query: &str,
        limit: u32,
    ) -> Result<Vec<SearchCandidate>, SpotifyApiError> {
        let should_panic = {
            let mut state = self.state.lock().unwrap();
            state.searches.push(query.to_string());
            state.panic_queries.contains(query)
        };
        if should_panic {
            panic!("search exploded for '{}'", query);
        }

        {
            let mut state = self.state.lock().unwrap();
            state.in_flight += 1;
            state.max_in_flight = state.max_in_flight.max(state.in_flight);
        }
        tokio::time::sleep(self.search_delay).await;

        let mut state = self.state.lock().unwrap();
        state.in_flight -= 1;
        let mut candidates = state.search_results.get(query).cloned().unwrap_or_default();
        candidates.truncate(limit as usize);
        Ok(candidates)
    }

    async fn current_user_id(&self) -> Result<String, SpotifyApiError> {
        Ok("fake-user".to_string())
    }

    async fn create_playlist(
        &self,
        _owner_id: &str,
        name: &str,
        _public: bool,
    ) -> Result<String, SpotifyApiError> {
        let mut state = self.state.lock().unwrap();
        state.created_playlists.push(name.to_string());
        Ok(format!("playlist-{}", state.created_playlists.len()))
    }

    async fn add_items(
        &self,
        playlist_id: &str,
        track_ids: &[String],
    ) -> Result<(), SpotifyApiError> {
        self.state
            .lock()
            .unwrap()
            .added
            .push((playlist_id.to_string(), track_ids.to_vec()));
        Ok(())
    }
}
