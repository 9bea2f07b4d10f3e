use async_trait::async_trait;
use reqwest::{Client, Response};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

use super::error::LiveDataError;
use super::provider::{FixtureWindow, FootballDataSource, UpstreamProbe};
use crate::config::Config;
use crate::models::StatusFilter;

const AUTH_HEADER: &str = "X-Auth-Token";

/// Client for the football-data.org v4 REST API.
/// Docs: <https://www.football-data.org/documentation/api>
pub struct FootballDataClient {
    http: Client,
    api_key: String,
    /// Base URL, overridable for local mirrors
    base_url: String,
    competition_id: String,
}

impl FootballDataClient {
    pub fn new(
        api_key: &str,
        base_url: &str,
        competition_id: &str,
        timeout: Duration,
    ) -> Result<Self, LiveDataError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LiveDataError::Transport(format!("Failed to build HTTP client: {}", e)))?;
        Ok(FootballDataClient {
            http,
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            competition_id: competition_id.to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, LiveDataError> {
        Self::new(
            config.api_key(),
            &config.football_data_api_url,
            &config.competition_id,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    fn matches_url(&self) -> String {
        format!("{}/competitions/{}/matches", self.base_url, self.competition_id)
    }

    fn standings_url(&self) -> String {
        format!("{}/competitions/{}/standings", self.base_url, self.competition_id)
    }

    async fn get_json(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<serde_json::Value, LiveDataError> {
        debug!("GET {} {:?}", url, query);
        let resp = self
            .http
            .get(url)
            .header(AUTH_HEADER, &self.api_key)
            .query(query)
            .send()
            .await?;
        decode_body(resp).await
    }
}

/// Classify a response: non-2xx is a rejection, an unreadable body a
/// transport failure, a non-JSON body a decode failure.
async fn decode_body(resp: Response) -> Result<serde_json::Value, LiveDataError> {
    let status = resp.status();
    if !status.is_success() {
        warn!("football-data.org rejected request: {}", status);
        return Err(LiveDataError::UpstreamRejected {
            status: status.as_u16(),
        });
    }
    let body = resp
        .bytes()
        .await
        .map_err(|e| LiveDataError::Transport(e.to_string()))?;
    Ok(serde_json::from_slice(&body)?)
}

fn status_param(statuses: &StatusFilter) -> String {
    statuses
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

#[async_trait]
impl FootballDataSource for FootballDataClient {
    fn name(&self) -> &str {
        "football-data.org"
    }

    async fn fetch_fixtures(
        &self,
        window: FixtureWindow,
        statuses: &StatusFilter,
    ) -> Result<serde_json::Value, LiveDataError> {
        let query = [
            ("dateFrom", window.date_from.format("%Y-%m-%d").to_string()),
            ("dateTo", window.date_to.format("%Y-%m-%d").to_string()),
            ("status", status_param(statuses)),
        ];
        self.get_json(&self.matches_url(), &query).await
    }

    async fn fetch_standings(&self) -> Result<serde_json::Value, LiveDataError> {
        self.get_json(&self.standings_url(), &[]).await
    }

    async fn probe(&self) -> Result<UpstreamProbe, LiveDataError> {
        let resp = self
            .http
            .get(self.standings_url())
            .header(AUTH_HEADER, &self.api_key)
            .send()
            .await?;

        let status_code = resp.status().as_u16();
        let headers: BTreeMap<String, String> = resp
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or_default().to_string()))
            .collect();
        let data = if status_code == 200 {
            resp.json::<serde_json::Value>().await.ok()
        } else {
            None
        };

        Ok(UpstreamProbe {
            status_code,
            headers,
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{all_statuses, MatchStatus};

    fn client() -> FootballDataClient {
        FootballDataClient::new(
            "secret",
            "https://api.football-data.org/v4/",
            "PL",
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_urls_use_competition_id() {
        let c = client();
        assert_eq!(
            c.matches_url(),
            "https://api.football-data.org/v4/competitions/PL/matches"
        );
        assert_eq!(
            c.standings_url(),
            "https://api.football-data.org/v4/competitions/PL/standings"
        );
    }

    #[test]
    fn test_status_param_is_comma_joined() {
        assert_eq!(
            status_param(&all_statuses()),
            "SCHEDULED,LIVE,IN_PLAY,PAUSED,FINISHED"
        );
        let only: StatusFilter = [MatchStatus::Finished].into_iter().collect();
        assert_eq!(status_param(&only), "FINISHED");
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        let c = FootballDataClient::new("k", "http://127.0.0.1:1", "PL", Duration::from_secs(1))
            .unwrap();
        let err = c.fetch_standings().await.unwrap_err();
        assert!(matches!(err, LiveDataError::Transport(_)), "got {:?}", err);
    }
}
