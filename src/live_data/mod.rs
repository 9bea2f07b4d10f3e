pub mod broadcast;
pub mod error;
pub mod football_data;
pub mod normalize;
pub mod provider;
pub mod refresh;
pub mod snapshot;

pub use broadcast::Broadcaster;
pub use error::LiveDataError;
pub use football_data::FootballDataClient;
pub use provider::{FixtureWindow, FootballDataSource};
pub use refresh::start_refresh_loop;
pub use snapshot::SnapshotStore;

use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::models::{all_statuses, MatchSummary, RefreshResult, StandingsSnapshot, StatusFilter};

/// Fetch + normalize pipeline shared by the refresh loop and on-demand
/// queries.
///
/// Only one refresh cycle runs at a time: the loop skips a tick when a cycle
/// is already in flight, and `refresh_now` shares the in-flight cycle's
/// result instead of starting another.
#[derive(Clone)]
pub struct LiveDataService {
    source: Arc<dyn FootballDataSource>,
    broadcaster: Broadcaster,
    refresh_statuses: StatusFilter,
    cycle_lock: Arc<Mutex<()>>,
    /// Result of the most recently finished cycle, published or not
    finished: Arc<watch::Sender<Arc<RefreshResult>>>,
}

impl LiveDataService {
    pub fn new(
        source: Arc<dyn FootballDataSource>,
        broadcaster: Broadcaster,
        refresh_statuses: StatusFilter,
    ) -> Self {
        LiveDataService {
            source,
            broadcaster,
            refresh_statuses,
            cycle_lock: Arc::new(Mutex::new(())),
            finished: Arc::new(watch::channel(Arc::new(RefreshResult::empty())).0),
        }
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    pub fn source(&self) -> &Arc<dyn FootballDataSource> {
        &self.source
    }

    pub async fn current(&self) -> Arc<RefreshResult> {
        self.broadcaster.store().current().await
    }

    /// Live fixtures for `[date, date + 1)`, never served from the snapshot.
    pub async fn matches_for_date(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<MatchSummary>, LiveDataError> {
        let statuses = all_statuses();
        let raw = self
            .source
            .fetch_fixtures(FixtureWindow::day(date), &statuses)
            .await?;
        normalize::normalize_fixtures(&raw, &statuses)
    }

    /// Run one cycle now, publish it and return it. When a cycle is already
    /// in flight, wait for it and return its result instead, so concurrent
    /// callers cost one upstream round trip.
    pub async fn refresh_now(&self) -> Arc<RefreshResult> {
        let mut finished = self.finished.subscribe();
        if let Ok(_cycle) = self.cycle_lock.try_lock() {
            return self.run_cycle().await;
        }

        debug!("Refresh already in flight, waiting for its result");
        if finished.changed().await.is_ok() {
            return finished.borrow_and_update().clone();
        }
        let _cycle = self.cycle_lock.lock().await;
        self.run_cycle().await
    }

    /// Run one cycle unless another is in flight. `None` means the request
    /// was coalesced into the running cycle.
    pub async fn try_refresh(&self) -> Option<Arc<RefreshResult>> {
        let _cycle = self.cycle_lock.try_lock().ok()?;
        Some(self.run_cycle().await)
    }

    async fn run_cycle(&self) -> Arc<RefreshResult> {
        let result = self.compose_and_publish().await;
        self.finished.send_replace(Arc::clone(&result));
        result
    }

    async fn compose_and_publish(&self) -> Arc<RefreshResult> {
        let (result, any_succeeded) = self.fetch_result().await;
        let result = Arc::new(result);

        // Nothing new to show when both halves failed; keep the last good
        // snapshot in front of viewers.
        if !any_succeeded {
            warn!(
                "Refresh from {} failed entirely: {}",
                self.source.name(),
                result.error.as_deref().unwrap_or_default()
            );
            return result;
        }

        if result.standings.is_empty() && result.error.is_none() {
            debug!("Provider has no TOTAL standings table yet");
        }

        let delivered = self.broadcaster.publish(Arc::clone(&result)).await;
        match &result.error {
            Some(e) => warn!(
                "Partial refresh published to {} viewer(s): {}",
                delivered, e
            ),
            None => info!(
                "Refresh published: {} matches, {} standings rows, {} viewer(s)",
                result.matches.len(),
                result.standings.standings.len(),
                delivered
            ),
        }
        result
    }

    /// Fetch both resources concurrently and compose whatever succeeded.
    /// The flag is false when neither half could be used.
    async fn fetch_result(&self) -> (RefreshResult, bool) {
        let window = FixtureWindow::today();
        let (fixtures, standings) = tokio::join!(
            self.source.fetch_fixtures(window, &self.refresh_statuses),
            self.source.fetch_standings(),
        );

        let mut errors = Vec::new();

        let matches = fixtures
            .and_then(|raw| normalize::normalize_fixtures(&raw, &self.refresh_statuses))
            .unwrap_or_else(|e| {
                errors.push(format!("fixtures: {}", e));
                Vec::new()
            });

        let standings = standings
            .and_then(|raw| normalize::normalize_standings(&raw))
            .unwrap_or_else(|e| {
                errors.push(format!("standings: {}", e));
                StandingsSnapshot::default()
            });

        let any_succeeded = errors.len() < 2;
        let result = RefreshResult {
            matches,
            standings,
            fetched_at: Utc::now(),
            error: (!errors.is_empty()).then(|| errors.join("; ")),
        };
        (result, any_succeeded)
    }
}

#[cfg(test)]
mod tests {
    use super::provider::stub::{fixtures_payload, standings_payload, StubSource};
    use super::*;
    use crate::models::MatchStatus;
    use std::time::Duration;

    fn service(source: Arc<StubSource>) -> LiveDataService {
        let broadcaster = Broadcaster::new(SnapshotStore::new(), 8);
        LiveDataService::new(source, broadcaster, all_statuses())
    }

    #[tokio::test]
    async fn test_refresh_now_publishes_full_result() {
        let source = Arc::new(StubSource::new(
            Ok(fixtures_payload(&[("FINISHED", Some(3), Some(1))])),
            Ok(standings_payload()),
        ));
        let svc = service(source.clone());

        let result = svc.refresh_now().await;
        assert!(result.error.is_none());
        assert_eq!(result.matches.len(), 1);
        assert_eq!(result.standings.standings.len(), 2);
        assert_eq!(*svc.current().await, *result);

        let window = source.last_window.lock().unwrap().unwrap();
        assert_eq!(window, FixtureWindow::today());
    }

    #[tokio::test]
    async fn test_partial_failure_still_publishes_other_half() {
        let source = Arc::new(StubSource::new(
            Err(LiveDataError::UpstreamRejected { status: 429 }),
            Ok(standings_payload()),
        ));
        let svc = service(source);

        let result = svc.refresh_now().await;
        assert!(result.matches.is_empty());
        assert_eq!(result.standings.standings.len(), 2);
        let err = result.error.clone().unwrap();
        assert!(err.contains("fixtures"), "{}", err);
        assert!(err.contains("429"), "{}", err);
        assert_eq!(svc.current().await.standings.standings.len(), 2);
    }

    #[tokio::test]
    async fn test_total_failure_keeps_previous_snapshot() {
        let source = Arc::new(StubSource::new(
            Ok(fixtures_payload(&[("IN_PLAY", Some(1), Some(0))])),
            Ok(standings_payload()),
        ));
        let svc = service(source.clone());
        let good = svc.refresh_now().await;

        source.set_fixtures(Err(LiveDataError::Transport("timed out".into())));
        source.set_standings(Err(LiveDataError::Decode("bad body".into())));
        let failed = svc.refresh_now().await;

        let err = failed.error.clone().unwrap();
        assert!(err.contains("fixtures") && err.contains("standings"), "{}", err);
        assert_eq!(svc.current().await.fetched_at, good.fetched_at);
    }

    #[tokio::test]
    async fn test_matches_for_date_bypasses_snapshot() {
        let source = Arc::new(StubSource::new(
            Ok(fixtures_payload(&[("FINISHED", Some(3), Some(1))])),
            Ok(standings_payload()),
        ));
        let svc = service(source.clone());
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

        let matches = svc.matches_for_date(date).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].score, "3-1");
        assert_eq!(matches[0].status, MatchStatus::Finished);

        let window = source.last_window.lock().unwrap().unwrap();
        assert_eq!(window.date_from, date);
        assert_eq!(window.date_to, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        // the snapshot was not touched
        assert_eq!(svc.current().await.fetched_at.timestamp(), 0);
    }

    #[tokio::test]
    async fn test_matches_for_date_surfaces_upstream_error() {
        let source = Arc::new(StubSource::new(
            Err(LiveDataError::UpstreamRejected { status: 403 }),
            Ok(standings_payload()),
        ));
        let svc = service(source);
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let err = svc.matches_for_date(date).await.unwrap_err();
        assert_eq!(err, LiveDataError::UpstreamRejected { status: 403 });
        assert_eq!(err.to_string(), "API returned status code: 403");
    }

    #[tokio::test]
    async fn test_try_refresh_is_coalesced_while_cycle_in_flight() {
        let source = Arc::new(
            StubSource::new(Ok(fixtures_payload(&[])), Ok(standings_payload())).gated(),
        );
        let svc = service(source.clone());

        let running = {
            let svc = svc.clone();
            tokio::spawn(async move { svc.refresh_now().await })
        };
        while source.fixture_calls() == 0 {
            tokio::task::yield_now().await;
        }

        assert!(svc.try_refresh().await.is_none());
        source.release(1);
        running.await.unwrap();
        assert_eq!(source.fixture_calls(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_refresh_now_shares_in_flight_cycle() {
        let source = Arc::new(
            StubSource::new(Ok(fixtures_payload(&[])), Ok(standings_payload())).gated(),
        );
        let svc = service(source.clone());

        let first = {
            let svc = svc.clone();
            tokio::spawn(async move { svc.refresh_now().await })
        };
        while source.fixture_calls() == 0 {
            tokio::task::yield_now().await;
        }
        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let svc = svc.clone();
                tokio::spawn(async move { svc.refresh_now().await })
            })
            .collect();
        tokio::time::sleep(Duration::from_millis(20)).await;

        source.release(10);
        let first = first.await.unwrap();
        for waiter in waiters {
            assert!(Arc::ptr_eq(&waiter.await.unwrap(), &first));
        }
        assert_eq!(source.fixture_calls(), 1);

        // once idle, the next caller gets a fresh cycle
        let next = svc.refresh_now().await;
        assert!(!Arc::ptr_eq(&next, &first));
        assert_eq!(source.fixture_calls(), 2);
    }

    #[tokio::test]
    async fn test_refresh_now_waiting_on_failed_cycle_gets_its_error() {
        let source = Arc::new(
            StubSource::new(
                Err(LiveDataError::Transport("down".into())),
                Err(LiveDataError::UpstreamRejected { status: 500 }),
            )
            .gated(),
        );
        let svc = service(source.clone());

        let first = {
            let svc = svc.clone();
            tokio::spawn(async move { svc.refresh_now().await })
        };
        while source.fixture_calls() == 0 {
            tokio::task::yield_now().await;
        }
        let waiter = {
            let svc = svc.clone();
            tokio::spawn(async move { svc.refresh_now().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        source.release(1);
        first.await.unwrap();
        let shared = waiter.await.unwrap();
        assert!(shared.error.as_deref().unwrap().contains("standings"));
        // the failed cycle did not replace the snapshot
        assert_eq!(svc.current().await.fetched_at.timestamp(), 0);
    }
}
