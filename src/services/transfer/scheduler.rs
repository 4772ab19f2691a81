use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::{Id, JoinSet};

use crate::ports::spotify::SpotifyClient;
use crate::source::SourceRecord;

use super::resolver::TrackResolver;
use super::types::{ResolutionOutcome, ResolutionReport};

pub const DEFAULT_CONCURRENCY: usize = 3;

/// Runs the resolver over every record with bounded parallelism.
///
/// Each record gets its own task behind a semaphore; finished tasks are
/// joined by a single collector loop, which is the only writer of the report.
pub struct ResolutionScheduler<C: SpotifyClient + 'static> {
    resolver: Arc<TrackResolver<C>>,
    concurrency: usize,
}

impl<C: SpotifyClient + 'static> ResolutionScheduler<C> {
    pub fn new(resolver: Arc<TrackResolver<C>>, concurrency: usize) -> Self {
        Self {
            resolver,
            concurrency: concurrency.max(1),
        }
    }

    pub async fn resolve_all(&self, records: Vec<SourceRecord>) -> ResolutionReport {
        let total = records.len();
        log::info!(
            "Searching Spotify for {} tracks ({} at a time)",
            total,
            self.concurrency
        );

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();
        let mut pending = HashMap::with_capacity(total);

        for record in records {
            let resolver = self.resolver.clone();
            let semaphore = semaphore.clone();
            let task_record = record.clone();
            let handle = tasks.spawn(async move {
                let _permit = semaphore.acquire().await;
                resolve_isolated(&resolver, task_record).await
            });
            pending.insert(handle.id(), record);
        }

        let report = collect_outcomes(tasks, pending, total).await;

        log::info!(
            "Search finished: {} found, {} not found",
            report.resolved.len(),
            report.not_found.len()
        );
        report
    }
}

/// Drain `tasks` into a report. `pending` maps each task to its record so a
/// task that never produced an outcome still counts as not found.
async fn collect_outcomes(
    mut tasks: JoinSet<ResolutionOutcome>,
    mut pending: HashMap<Id, SourceRecord>,
    total: usize,
) -> ResolutionReport {
    let mut report = ResolutionReport::default();

    while let Some(joined) = tasks.join_next_with_id().await {
        let outcome = match joined {
            Ok((id, outcome)) => {
                pending.remove(&id);
                outcome
            }
            // Panics are caught inside the task, so this is cancellation only
            Err(e) => match pending.remove(&e.id()) {
                Some(record) => {
                    log::error!(
                        "Resolution of '{}' did not complete: {}",
                        record.describe(),
                        e
                    );
                    ResolutionOutcome::not_found(record)
                }
                None => {
                    log::error!("Resolution task did not complete: {}", e);
                    continue;
                }
            },
        };

        let status = if outcome.is_found() {
            "Found"
        } else {
            "Not found"
        };
        log::info!(
            "[{}/{}] {}: {}",
            report.len() + 1,
            total,
            status,
            outcome.record.describe()
        );
        report.push(outcome);
    }

    report
}

/// Resolve one record, turning a panic into a not-found outcome for that record.
async fn resolve_isolated<C: SpotifyClient>(
    resolver: &TrackResolver<C>,
    record: SourceRecord,
) -> ResolutionOutcome {
    match AssertUnwindSafe(resolver.resolve(record.clone()))
        .catch_unwind()
        .await
    {
        Ok(outcome) => outcome,
        Err(panic) => {
            log::error!(
                "Resolving '{}' panicked: {}",
                record.describe(),
                panic_message(panic.as_ref())
            );
            ResolutionOutcome::not_found(record)
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::time::Duration;

    use crate::ports::spotify::SearchCandidate;
    use crate::services::transfer::resolver::ResolverSettings;
    use crate::services::transfer::types::JitterRange;
    use crate::test_utils::FakeSpotifyClient;

    fn scheduler(
        client: FakeSpotifyClient,
        concurrency: usize,
    ) -> ResolutionScheduler<FakeSpotifyClient> {
        let settings = ResolverSettings {
            search_jitter: JitterRange::none(),
            rate_limit_jitter: JitterRange::none(),
            ..ResolverSettings::default()
        };
        let resolver = TrackResolver::new(Arc::new(client), settings);
        ResolutionScheduler::new(Arc::new(resolver), concurrency)
    }

    fn records(count: u32) -> Vec<SourceRecord> {
        (1..=count)
            .map(|n| SourceRecord::new(n, format!("Song {}", n), format!("Artist {}", n)))
            .collect()
    }

    #[tokio::test]
    async fn test_every_record_yields_one_outcome() {
        let client = FakeSpotifyClient::new();
        // even ordinals resolve on their first query
        for n in (2..=40).step_by(2) {
            client.add_search_result(
                &format!("track:song {} artist:Artist {}", n, n),
                vec![SearchCandidate {
                    id: format!("id-{}", n),
                    display_name: format!("Song {}", n),
                }],
            );
        }

        let report = scheduler(client, 3).resolve_all(records(40)).await;

        assert_eq!(report.len(), 40);
        assert_eq!(report.resolved.len(), 20);
        assert_eq!(report.not_found.len(), 20);

        let ordinals: HashSet<u32> = report
            .resolved
            .iter()
            .chain(report.not_found.iter())
            .map(|outcome| outcome.record.ordinal)
            .collect();
        assert_eq!(ordinals, (1..=40).collect::<HashSet<u32>>());

        assert!(report.resolved.iter().all(|o| o.record.ordinal % 2 == 0));
        assert!(report.not_found.iter().all(|o| o.track_id.is_none()));
    }

    #[tokio::test]
    async fn test_panicking_record_is_isolated() {
        let client = FakeSpotifyClient::new();
        client.panic_on_query("track:song 2 artist:Artist 2");
        client.add_search_result(
            "track:song 3 artist:Artist 3",
            vec![SearchCandidate {
                id: "id-3".into(),
                display_name: "Song 3".into(),
            }],
        );

        let report = scheduler(client, 2).resolve_all(records(3)).await;

        assert_eq!(report.len(), 3);
        assert_eq!(report.track_ids(), vec!["id-3"]);
        let missing: HashSet<u32> = report.not_found.iter().map(|o| o.record.ordinal).collect();
        assert_eq!(missing, HashSet::from([1, 2]));
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let client = FakeSpotifyClient::new().with_search_delay(Duration::from_millis(5));

        let report = scheduler(client.clone(), 3).resolve_all(records(12)).await;

        assert_eq!(report.len(), 12);
        assert!(client.max_in_flight_searches() <= 3);
        assert!(client.max_in_flight_searches() >= 2);
    }

    #[tokio::test]
    async fn test_cancelled_task_still_yields_outcome() {
        let mut tasks = JoinSet::new();
        let mut pending = HashMap::new();

        let stuck = SourceRecord::new(1, "Stuck", "Nobody");
        let handle = tasks.spawn(std::future::pending::<ResolutionOutcome>());
        pending.insert(handle.id(), stuck.clone());
        handle.abort();

        let done = SourceRecord::new(2, "Done", "Somebody");
        let finished = ResolutionOutcome::found(done.clone(), "id-2".into());
        let handle = tasks.spawn(async move { finished });
        pending.insert(handle.id(), done);

        let report = collect_outcomes(tasks, pending, 2).await;

        assert_eq!(report.len(), 2);
        assert_eq!(report.track_ids(), vec!["id-2"]);
        assert_eq!(report.not_found.len(), 1);
        assert_eq!(report.not_found[0].record, stuck);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let report = scheduler(FakeSpotifyClient::new(), 3).resolve_all(vec![]).await;
        assert_eq!(report.len(), 0);
    }

    #[test]
    fn test_zero_concurrency_is_clamped() {
        let scheduler = scheduler(FakeSpotifyClient::new(), 0);
        assert_eq!(scheduler.concurrency, 1);
    }
}
