use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

use super::error::LiveDataError;
use crate::models::StatusFilter;

/// Half-open date window `[date_from, date_to)` for fixture queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixtureWindow {
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
}

impl FixtureWindow {
    /// Window covering a single day.
    pub fn day(date: NaiveDate) -> Self {
        FixtureWindow {
            date_from: date,
            date_to: date.succ_opt().unwrap_or(date),
        }
    }

    /// `[today_UTC, today_UTC + 1 day)`
    pub fn today() -> Self {
        Self::day(chrono::Utc::now().date_naive())
    }
}

/// Raw outcome of a connectivity check against the provider.
#[derive(Debug, Clone, Serialize)]
pub struct UpstreamProbe {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub data: Option<serde_json::Value>,
}

/// Source of raw provider payloads. Implementations do no retrying.
#[async_trait]
pub trait FootballDataSource: Send + Sync {
    /// Raw matches payload for the window, restricted upstream to `statuses`.
    async fn fetch_fixtures(
        &self,
        window: FixtureWindow,
        statuses: &StatusFilter,
    ) -> Result<serde_json::Value, LiveDataError>;

    /// Raw standings payload for the configured competition.
    async fn fetch_standings(&self) -> Result<serde_json::Value, LiveDataError>;

    /// Diagnostic request reporting what the provider actually answered.
    async fn probe(&self) -> Result<UpstreamProbe, LiveDataError>;

    /// Human-readable name for logging.
    fn name(&self) -> &str;
}

#[cfg(test)]
pub mod stub {
    //! Scriptable in-memory source for tests.

    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::Semaphore;

    pub type Reply = Result<serde_json::Value, LiveDataError>;

    pub struct StubSource {
        fixtures: Mutex<Reply>,
        standings: Mutex<Reply>,
        pub fixture_calls: AtomicUsize,
        pub last_window: Mutex<Option<FixtureWindow>>,
        /// When set, each fixtures fetch waits for one permit.
        gate: Option<Semaphore>,
        delay: Option<Duration>,
    }

    impl StubSource {
        pub fn new(fixtures: Reply, standings: Reply) -> Self {
            StubSource {
                fixtures: Mutex::new(fixtures),
                standings: Mutex::new(standings),
                fixture_calls: AtomicUsize::new(0),
                last_window: Mutex::new(None),
                gate: None,
                delay: None,
            }
        }

        pub fn gated(mut self) -> Self {
            self.gate = Some(Semaphore::new(0));
            self
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub fn release(&self, permits: usize) {
            if let Some(gate) = &self.gate {
                gate.add_permits(permits);
            }
        }

        pub fn set_fixtures(&self, reply: Reply) {
            *self.fixtures.lock().unwrap() = reply;
        }

        pub fn set_standings(&self, reply: Reply) {
            *self.standings.lock().unwrap() = reply;
        }

        pub fn fixture_calls(&self) -> usize {
            self.fixture_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl FootballDataSource for StubSource {
        async fn fetch_fixtures(
            &self,
            window: FixtureWindow,
            _statuses: &StatusFilter,
        ) -> Result<serde_json::Value, LiveDataError> {
            self.fixture_calls.fetch_add(1, Ordering::SeqCst);
            *self.last_window.lock().unwrap() = Some(window);
            if let Some(gate) = &self.gate {
                gate.acquire().await.unwrap().forget();
            }
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.fixtures.lock().unwrap().clone()
        }

        async fn fetch_standings(&self) -> Result<serde_json::Value, LiveDataError> {
            self.standings.lock().unwrap().clone()
        }

        async fn probe(&self) -> Result<UpstreamProbe, LiveDataError> {
            let data = self.standings.lock().unwrap().clone()?;
            Ok(UpstreamProbe {
                status_code: 200,
                headers: BTreeMap::from([(
                    "content-type".to_string(),
                    "application/json".to_string(),
                )]),
                data: Some(data),
            })
        }

        fn name(&self) -> &str {
            "stub"
        }
    }

    /// Minimal provider payload with one match per `(status, home, away)`.
    pub fn fixtures_payload(entries: &[(&str, Option<u32>, Option<u32>)]) -> serde_json::Value {
        let matches: Vec<serde_json::Value> = entries
            .iter()
            .enumerate()
            .map(|(i, (status, home, away))| {
                serde_json::json!({
                    "status": status,
                    "utcDate": "2024-01-01T15:00:00Z",
                    "homeTeam": { "name": format!("Home {}", i), "crest": "https://crests.example/h.png" },
                    "awayTeam": { "name": format!("Away {}", i) },
                    "score": { "fullTime": { "home": home, "away": away } }
                })
            })
            .collect();
        serde_json::json!({
            "competition": { "emblem": "https://crests.example/pl.png" },
            "matches": matches
        })
    }

    pub fn standings_payload() -> serde_json::Value {
        serde_json::json!({
            "competition": { "emblem": "https://crests.example/pl.png" },
            "standings": [
                { "type": "HOME", "table": [] },
                { "type": "TOTAL", "table": [
                    { "position": 1, "team": { "name": "Arsenal", "crest": "a.png" },
                      "playedGames": 3, "won": 3, "draw": 0, "lost": 0, "points": 9, "goalDifference": 7 },
                    { "position": 2, "team": { "name": "Chelsea" },
                      "playedGames": 3, "won": 2, "draw": 1, "lost": 0, "points": 7, "goalDifference": 3 }
                ]}
            ]
        })
    }
}
