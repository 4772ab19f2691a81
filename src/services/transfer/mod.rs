//! Moving a scraped playlist onto Spotify.
//!
//! The pipeline is: create the destination playlist, resolve every source
//! record concurrently, add the resolved tracks in batches, then persist the
//! records that could not be found.

pub mod committer;
pub mod report;
pub mod resolver;
pub mod scheduler;
pub mod types;

use std::path::PathBuf;
use std::sync::Arc;

use color_eyre::eyre::{Result, WrapErr, bail};

use crate::ports::spotify::SpotifyClient;
use crate::source::{DEFAULT_PLAYLIST_NAME, SourceRecord, load_records, read_playlist_name};

use committer::{CommitSettings, PlaylistCommitter, playlist_name_or_default};
use resolver::{ResolverSettings, TrackResolver};
use scheduler::{DEFAULT_CONCURRENCY, ResolutionScheduler};
use types::TransferSummary;

#[derive(Debug, Clone)]
pub struct TransferSettings {
    pub concurrency: usize,
    pub resolver: ResolverSettings,
    pub commit: CommitSettings,
    pub not_found_directory: PathBuf,
    pub sort_not_found_by_ordinal: bool,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            resolver: ResolverSettings::default(),
            commit: CommitSettings::default(),
            not_found_directory: PathBuf::from("not_found_songs"),
            sort_not_found_by_ordinal: false,
        }
    }
}

/// One playlist to transfer: its track list and where its name comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistJob {
    pub input: PathBuf,
    pub raw: Option<PathBuf>,
    pub name: Option<String>,
}

impl PlaylistJob {
    /// Pair repeated inputs with their raw scrapes and names by position.
    ///
    /// `raws` and `names` are either empty or exactly as long as `inputs`.
    pub fn pair(
        inputs: Vec<PathBuf>,
        raws: Vec<PathBuf>,
        names: Vec<String>,
    ) -> Result<Vec<Self>> {
        if !raws.is_empty() && raws.len() != inputs.len() {
            bail!(
                "Got {} --raw values for {} --input values",
                raws.len(),
                inputs.len()
            );
        }
        if !names.is_empty() && names.len() != inputs.len() {
            bail!(
                "Got {} --name values for {} --input values",
                names.len(),
                inputs.len()
            );
        }

        let mut raws = raws.into_iter();
        let mut names = names.into_iter();
        Ok(inputs
            .into_iter()
            .map(|input| PlaylistJob {
                input,
                raw: raws.next(),
                name: names.next(),
            })
            .collect())
    }

    /// Explicit name, else line 9 of the raw scrape, else the default name.
    pub fn playlist_name(&self) -> String {
        match (&self.name, &self.raw) {
            (Some(name), _) => name.clone(),
            (None, Some(raw)) => read_playlist_name(raw),
            (None, None) => DEFAULT_PLAYLIST_NAME.to_string(),
        }
    }
}

#[derive(Debug)]
pub struct JobResult {
    pub input: PathBuf,
    pub result: Result<TransferSummary>,
}

pub struct TransferService<C: SpotifyClient + 'static> {
    committer: PlaylistCommitter<C>,
    scheduler: ResolutionScheduler<C>,
    not_found_directory: PathBuf,
    sort_not_found_by_ordinal: bool,
}

impl<C: SpotifyClient + 'static> TransferService<C> {
    pub fn new(client: Arc<C>, settings: TransferSettings) -> Self {
        let resolver = TrackResolver::new(client.clone(), settings.resolver);
        Self {
            committer: PlaylistCommitter::new(client, settings.commit),
            scheduler: ResolutionScheduler::new(Arc::new(resolver), settings.concurrency),
            not_found_directory: settings.not_found_directory,
            sort_not_found_by_ordinal: settings.sort_not_found_by_ordinal,
        }
    }

    /// Transfer `records` into a new playlist called `playlist_name`.
    ///
    /// Only failing to create the playlist is an error. Chunks that could not
    /// be added and records that could not be found end up in the summary.
    pub async fn run(
        &self,
        records: Vec<SourceRecord>,
        playlist_name: &str,
    ) -> Result<TransferSummary> {
        let playlist_name = playlist_name_or_default(playlist_name);
        let playlist_id = self.committer.create_playlist(&playlist_name).await?;

        let resolution = self.scheduler.resolve_all(records).await;
        let track_ids = resolution.track_ids();

        let commit = self.committer.add_tracks(&playlist_id, &track_ids).await;

        let not_found = report::not_found_lines(&resolution, self.sort_not_found_by_ordinal);
        let not_found_file =
            report::write_not_found_file(&self.not_found_directory, &playlist_name, &not_found)
                .await;

        Ok(TransferSummary {
            playlist_name,
            playlist_id,
            found: track_ids.len(),
            not_found,
            added: commit.added,
            failed_chunks: commit.failed_chunks,
            not_found_file,
        })
    }

    /// Transfer each playlist in turn. A failing playlist is logged and
    /// reported without stopping the ones after it.
    pub async fn run_jobs(&self, jobs: Vec<PlaylistJob>) -> Vec<JobResult> {
        let total = jobs.len();
        let mut results = Vec::with_capacity(total);

        for (index, job) in jobs.into_iter().enumerate() {
            log::info!(
                "Processing playlist {}/{}: {}",
                index + 1,
                total,
                job.input.display()
            );

            let result = self.run_job(&job).await;
            if let Err(e) = &result {
                log::error!("Playlist from {} failed: {:?}", job.input.display(), e);
            }
            results.push(JobResult {
                input: job.input,
                result,
            });
        }

        results
    }

    async fn run_job(&self, job: &PlaylistJob) -> Result<TransferSummary> {
        let records = load_records(&job.input)
            .wrap_err_with(|| format!("Failed to load tracks from {}", job.input.display()))?;
        log::info!("Loaded {} tracks from {}", records.len(), job.input.display());

        self.run(records, &job.playlist_name()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::spotify::{MockSpotifyClient, SearchCandidate, SpotifyApiError};
    use crate::services::transfer::types::JitterRange;
    use crate::test_utils::FakeSpotifyClient;

    fn quiet_settings(not_found_directory: PathBuf) -> TransferSettings {
        TransferSettings {
            resolver: ResolverSettings {
                search_jitter: JitterRange::none(),
                rate_limit_jitter: JitterRange::none(),
                ..ResolverSettings::default()
            },
            commit: CommitSettings {
                rate_limit_jitter: JitterRange::none(),
                ..CommitSettings::default()
            },
            not_found_directory,
            ..TransferSettings::default()
        }
    }

    #[tokio::test]
    async fn test_transfer_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let client = FakeSpotifyClient::new();
        client.add_search_result(
            "track:song a artist:Artist X",
            vec![SearchCandidate {
                id: "id-a".into(),
                display_name: "Song A".into(),
            }],
        );
        // every query for Song B only finds a remix
        for query in [
            "track:song b artist:Artist Y",
            "song b Artist Y",
            "song b",
            "track:song b artist:artist y",
            "song b artist y",
        ] {
            client.add_search_result(
                query,
                vec![SearchCandidate {
                    id: "id-b-remix".into(),
                    display_name: "Song B (Remix)".into(),
                }],
            );
        }

        let service = TransferService::new(
            Arc::new(client.clone()),
            quiet_settings(dir.path().to_path_buf()),
        );
        let records = vec![
            SourceRecord::new(1, "Song A", "Artist X"),
            SourceRecord::new(2, "Song B (Live)", "Artist Y"),
        ];

        let summary = service.run(records, "Road Trip").await.unwrap();

        assert_eq!(client.created_playlists(), vec!["Road Trip"]);
        assert_eq!(
            client.added_items(),
            vec![("playlist-1".to_string(), vec!["id-a".to_string()])]
        );
        assert_eq!(summary.found, 1);
        assert_eq!(summary.added, 1);
        assert_eq!(summary.not_found, vec!["Song B (Live) by Artist Y"]);
        assert!(summary.to_string().contains("1 found, 1 not found"));

        let path = summary.not_found_file.unwrap();
        assert_eq!(
            std::fs::read_to_string(path).unwrap(),
            "Song B (Live) by Artist Y\n"
        );

        // record 1 stops at its first query, record 2 walks all six
        assert_eq!(client.searches().len(), 7);
    }

    #[tokio::test]
    async fn test_transfer_without_misses_writes_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let client = FakeSpotifyClient::new();
        client.add_search_result(
            "track:song a artist:Artist X",
            vec![SearchCandidate {
                id: "id-a".into(),
                display_name: "Song A".into(),
            }],
        );

        let service = TransferService::new(
            Arc::new(client),
            quiet_settings(dir.path().join("not_found_songs")),
        );
        let summary = service
            .run(vec![SourceRecord::new(1, "Song A", "Artist X")], "")
            .await
            .unwrap();

        assert_eq!(summary.playlist_name, "Converted from Amazon Music");
        assert!(summary.not_found.is_empty());
        assert!(summary.not_found_file.is_none());
        assert!(!dir.path().join("not_found_songs").exists());
    }

    #[tokio::test]
    async fn test_playlist_creation_failure_aborts_before_searching() {
        let mut client = MockSpotifyClient::new();
        client
            .expect_current_user_id()
            .returning(|| Ok("user-1".into()));
        client.expect_create_playlist().returning(|_, _, _| {
            Err(SpotifyApiError::Api {
                status: 403,
                message: "Insufficient client scope".into(),
            })
        });
        client.expect_search_tracks().never();
        client.expect_add_items().never();

        let dir = tempfile::tempdir().unwrap();
        let service = TransferService::new(Arc::new(client), quiet_settings(dir.path().into()));
        let result = service
            .run(vec![SourceRecord::new(1, "Song A", "Artist X")], "Mix")
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_summary_survives_failed_chunks() {
        let mut client = MockSpotifyClient::new();
        client
            .expect_current_user_id()
            .returning(|| Ok("user-1".into()));
        client
            .expect_create_playlist()
            .returning(|_, _, _| Ok("pl-1".into()));
        client.expect_search_tracks().returning(|query, _| {
            Ok(vec![SearchCandidate {
                id: format!("id-{}", query),
                display_name: "Song".into(),
            }])
        });
        client.expect_add_items().returning(|_, _| {
            Err(SpotifyApiError::Api {
                status: 502,
                message: "bad gateway".into(),
            })
        });

        let dir = tempfile::tempdir().unwrap();
        let service = TransferService::new(Arc::new(client), quiet_settings(dir.path().into()));
        let summary = service
            .run(
                vec![
                    SourceRecord::new(1, "Song", "A"),
                    SourceRecord::new(2, "Song", "B"),
                ],
                "Mix",
            )
            .await
            .unwrap();

        assert_eq!(summary.found, 2);
        assert_eq!(summary.added, 0);
        assert_eq!(summary.failed_chunks.len(), 1);
        assert!(summary.to_string().contains("2 found, 0 not found"));
    }

    #[test]
    fn test_pair_jobs_by_position() {
        let jobs = PlaylistJob::pair(
            vec!["a.csv".into(), "b.csv".into()],
            vec!["a.txt".into(), "b.txt".into()],
            vec![],
        )
        .unwrap();

        assert_eq!(
            jobs,
            vec![
                PlaylistJob {
                    input: "a.csv".into(),
                    raw: Some("a.txt".into()),
                    name: None,
                },
                PlaylistJob {
                    input: "b.csv".into(),
                    raw: Some("b.txt".into()),
                    name: None,
                },
            ]
        );

        let too_few_raws =
            PlaylistJob::pair(vec!["a.csv".into(), "b.csv".into()], vec!["a.txt".into()], vec![]);
        assert!(too_few_raws.is_err());
        let too_many_names =
            PlaylistJob::pair(vec!["a.csv".into()], vec![], vec!["x".into(), "y".into()]);
        assert!(too_many_names.is_err());
    }

    #[test]
    fn test_job_playlist_name_precedence() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("raw.txt");
        std::fs::write(&raw, "1\n2\n3\n4\n5\n6\n7\n8\nFrom Raw\n").unwrap();

        let mut job = PlaylistJob {
            input: "tracks.csv".into(),
            raw: Some(raw),
            name: Some("Explicit".into()),
        };
        assert_eq!(job.playlist_name(), "Explicit");

        job.name = None;
        assert_eq!(job.playlist_name(), "From Raw");

        job.raw = None;
        assert_eq!(job.playlist_name(), DEFAULT_PLAYLIST_NAME);
    }

    #[tokio::test]
    async fn test_failed_playlist_does_not_stop_the_next() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("second.csv");
        std::fs::write(&input, "Number,Title,Artist\n1,Song A,Artist X\n").unwrap();

        let client = FakeSpotifyClient::new();
        client.add_search_result(
            "track:song a artist:Artist X",
            vec![SearchCandidate {
                id: "id-a".into(),
                display_name: "Song A".into(),
            }],
        );

        let service = TransferService::new(
            Arc::new(client.clone()),
            quiet_settings(dir.path().join("not_found_songs")),
        );
        let jobs = PlaylistJob::pair(
            vec![dir.path().join("missing.csv"), input.clone()],
            vec![],
            vec!["First".into(), "Second".into()],
        )
        .unwrap();

        let results = service.run_jobs(jobs).await;

        assert_eq!(results.len(), 2);
        assert!(results[0].result.is_err());
        assert_eq!(results[1].input, input);
        let summary = results[1].result.as_ref().unwrap();
        assert_eq!(summary.playlist_name, "Second");
        assert_eq!(summary.added, 1);
        assert_eq!(client.created_playlists(), vec!["Second"]);
    }
}
